use serde_json::Value;

use crate::FundamentalsSummary;

/// Turns a raw fundamentals mapping into a [`FundamentalsSummary`].
///
/// `None` means no data was submitted at all; insufficient data still yields
/// a summary with the affected fields left empty.
pub trait FundamentalsDeriver: Send + Sync {
    fn derive_summary(&self, input: &Value) -> Option<FundamentalsSummary>;
}
