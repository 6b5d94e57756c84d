use analysis_core::{FundamentalsDeriver, FundamentalsSummary};
use serde_json::{Map, Value};
use statrs::statistics::Statistics;

/// Accepted input keys per series, in lookup order. The first key present
/// with a non-null value wins.
pub const REVENUE_KEYS: &[&str] = &["revenue_history", "revenues"];
pub const OP_MARGIN_KEYS: &[&str] = &["op_margin_history", "op_margins"];
pub const FCF_KEYS: &[&str] = &["fcf_history", "fcfs"];

/// Years spanned by the revenue CAGR window.
const CAGR_YEARS: usize = 3;

/// A chronological series, oldest first. `None` marks a missing observation.
pub type Series = Vec<Option<f64>>;

/// The three raw series the engine reads, after alias resolution.
///
/// A series that was missing, not an array, or held a non-numeric entry is
/// `None` and only blanks its own metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFundamentals {
    pub revenue_history: Option<Series>,
    pub op_margin_history: Option<Series>,
    pub fcf_history: Option<Series>,
}

impl RawFundamentals {
    /// Resolve the series from a JSON mapping. `None` for null, non-object
    /// or empty input, meaning nothing was submitted.
    pub fn from_value(input: &Value) -> Option<Self> {
        let map = match input {
            Value::Object(map) if !map.is_empty() => map,
            Value::Object(_) | Value::Null => return None,
            other => {
                tracing::debug!(kind = ?other, "fundamentals input is not a mapping");
                return None;
            }
        };

        Some(Self {
            revenue_history: lookup_series(map, REVENUE_KEYS),
            op_margin_history: lookup_series(map, OP_MARGIN_KEYS),
            fcf_history: lookup_series(map, FCF_KEYS),
        })
    }
}

fn lookup_series(map: &Map<String, Value>, aliases: &[&str]) -> Option<Series> {
    let (key, value) = aliases
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()).map(|value| (*key, value)))?;

    let items = match value {
        Value::Array(items) => items,
        _ => {
            tracing::debug!(key, "series is not an array, ignoring");
            return None;
        }
    };

    let mut series = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Null => series.push(None),
            Value::Number(n) => series.push(n.as_f64()),
            _ => {
                tracing::debug!(key, "series holds a non-numeric entry, ignoring");
                return None;
            }
        }
    }
    Some(series)
}

pub struct FundamentalAnalysisEngine;

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compound growth over the last three years: `(last / prior)^(1/3) - 1`
    /// with `prior` three observations before `last`.
    fn calculate_revenue_cagr_3y(&self, revenues: &[Option<f64>]) -> Option<f64> {
        if revenues.len() < CAGR_YEARS + 1 {
            return None;
        }
        let last = revenues[revenues.len() - 1]?;
        let prior = revenues[revenues.len() - 1 - CAGR_YEARS]?;
        if prior <= 0.0 || last <= 0.0 {
            return None;
        }
        let cagr = (last / prior).powf(1.0 / CAGR_YEARS as f64) - 1.0;
        cagr.is_finite().then_some(cagr)
    }

    /// Average yearly change between the first and last margin, in bps.
    /// Margins are decimals (0.12 for 12%); intermediate points are ignored.
    fn calculate_op_margin_trend_bps(&self, margins: &[Option<f64>]) -> Option<f64> {
        if margins.len() < 2 {
            return None;
        }
        let first = margins[0]?;
        let last = margins[margins.len() - 1]?;
        let years = (margins.len() - 1) as f64;
        let trend = (last - first) / years * 10_000.0;
        trend.is_finite().then_some(trend)
    }

    /// `1 / (1 + cv)` where `cv` is the population coefficient of variation
    /// of the non-missing values, clamped to 0..=1.
    fn calculate_fcf_stability(&self, fcfs: &[Option<f64>]) -> Option<f64> {
        let values: Vec<f64> = fcfs.iter().flatten().copied().collect();
        if values.len() < 2 {
            return None;
        }
        let mean = values.iter().mean();
        if mean == 0.0 || !mean.is_finite() {
            return None;
        }
        let cv = values.iter().population_std_dev() / mean.abs();
        let score = (1.0 / (1.0 + cv)).clamp(0.0, 1.0);
        score.is_finite().then_some(score)
    }

    /// Derive the summary from already-resolved series.
    pub fn summarize(&self, raw: &RawFundamentals) -> FundamentalsSummary {
        let revenue_cagr_3y = raw
            .revenue_history
            .as_deref()
            .and_then(|s| self.calculate_revenue_cagr_3y(s));
        let op_margin_trend_bps_per_year = raw
            .op_margin_history
            .as_deref()
            .and_then(|s| self.calculate_op_margin_trend_bps(s));
        let fcf_stability_score = raw
            .fcf_history
            .as_deref()
            .and_then(|s| self.calculate_fcf_stability(s));

        tracing::debug!(
            revenue_cagr_3y = ?revenue_cagr_3y,
            op_margin_trend_bps_per_year = ?op_margin_trend_bps_per_year,
            fcf_stability_score = ?fcf_stability_score,
            "fundamentals summary derived"
        );

        FundamentalsSummary {
            revenue_cagr_3y,
            // reserved: no gross margin series is read yet
            gross_margin_trend_bps_per_year: None,
            op_margin_trend_bps_per_year,
            fcf_stability_score,
            ..Default::default()
        }
    }

    /// Derive the summary from a raw JSON mapping. `None` only when the
    /// mapping is absent or empty.
    pub fn derive_summary(&self, input: &Value) -> Option<FundamentalsSummary> {
        RawFundamentals::from_value(input).map(|raw| self.summarize(&raw))
    }
}

impl FundamentalsDeriver for FundamentalAnalysisEngine {
    fn derive_summary(&self, input: &Value) -> Option<FundamentalsSummary> {
        FundamentalAnalysisEngine::derive_summary(self, input)
    }
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn engine() -> FundamentalAnalysisEngine {
        FundamentalAnalysisEngine::new()
    }

    fn series(values: &[f64]) -> Series {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_absent_or_empty_input() {
        assert!(engine().derive_summary(&Value::Null).is_none());
        assert!(engine().derive_summary(&json!({})).is_none());
        assert!(engine().derive_summary(&json!([100, 110])).is_none());
    }

    #[test]
    fn test_unrelated_keys_still_yield_a_summary() {
        let summary = engine().derive_summary(&json!({"net_debt_to_ebitda": 1.2})).unwrap();
        assert_eq!(summary, FundamentalsSummary::default());
    }

    #[test]
    fn test_scenario_summary() {
        let summary = engine()
            .derive_summary(&json!({
                "revenue_history": [100, 110, 121, 133.1],
                "op_margin_history": [0.10, 0.14],
                "fcf_history": [50, 55, 48]
            }))
            .unwrap();

        assert_abs_diff_eq!(summary.revenue_cagr_3y.unwrap(), 0.10, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.op_margin_trend_bps_per_year.unwrap(), 400.0, epsilon = 1e-6);

        let mean = 51.0;
        let std = (((50.0f64 - mean).powi(2) + (55.0f64 - mean).powi(2) + (48.0f64 - mean).powi(2)) / 3.0).sqrt();
        assert_abs_diff_eq!(summary.fcf_stability_score.unwrap(), 1.0 / (1.0 + std / mean), epsilon = 1e-12);
        assert!(summary.gross_margin_trend_bps_per_year.is_none());
        assert!(summary.roe.is_none() && summary.notes.is_none());
    }

    #[test]
    fn test_aliases() {
        let summary = engine()
            .derive_summary(&json!({
                "revenues": [100, 110, 121, 133.1],
                "op_margins": [0.10, 0.12, 0.14],
                "fcfs": [50, 50, 50]
            }))
            .unwrap();
        assert!(summary.revenue_cagr_3y.is_some());
        assert_abs_diff_eq!(summary.op_margin_trend_bps_per_year.unwrap(), 200.0, epsilon = 1e-6);
        assert_abs_diff_eq!(summary.fcf_stability_score.unwrap(), 1.0);
    }

    #[test]
    fn test_primary_key_wins_over_alias() {
        let summary = engine()
            .derive_summary(&json!({
                "op_margin_history": [0.10, 0.14],
                "op_margins": [0.10, 0.10]
            }))
            .unwrap();
        assert_abs_diff_eq!(summary.op_margin_trend_bps_per_year.unwrap(), 400.0, epsilon = 1e-6);
    }

    #[test]
    fn test_null_primary_key_falls_back_to_alias() {
        let summary = engine()
            .derive_summary(&json!({
                "revenue_history": null,
                "revenues": [100, 110, 121, 133.1],
                "fcf_history": null
            }))
            .unwrap();
        assert_abs_diff_eq!(summary.revenue_cagr_3y.unwrap(), 0.10, epsilon = 1e-9);
        assert!(summary.fcf_stability_score.is_none());
    }

    #[test]
    fn test_cagr_guards() {
        let e = engine();
        assert!(e.calculate_revenue_cagr_3y(&series(&[100.0, 110.0, 121.0])).is_none());
        assert!(e.calculate_revenue_cagr_3y(&series(&[0.0, 110.0, 121.0, 133.1])).is_none());
        assert!(e.calculate_revenue_cagr_3y(&series(&[-5.0, 110.0, 121.0, 133.1])).is_none());
        assert!(e.calculate_revenue_cagr_3y(&series(&[100.0, 110.0, 121.0, 0.0])).is_none());
        assert!(e.calculate_revenue_cagr_3y(&[Some(100.0), Some(110.0), Some(121.0), None]).is_none());
    }

    #[test]
    fn test_cagr_uses_last_four_points_only() {
        // the first value sits outside the 3-year window
        let cagr = engine()
            .calculate_revenue_cagr_3y(&series(&[-40.0, 100.0, 150.0, 90.0, 800.0]))
            .unwrap();
        assert_abs_diff_eq!(cagr, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_margin_trend_uses_endpoints() {
        let e = engine();
        assert!(e.calculate_op_margin_trend_bps(&series(&[0.10])).is_none());
        assert_abs_diff_eq!(e.calculate_op_margin_trend_bps(&series(&[0.10, 0.14])).unwrap(), 400.0, epsilon = 1e-6);
        assert_abs_diff_eq!(
            e.calculate_op_margin_trend_bps(&series(&[0.10, 0.50, -0.2, 0.14])).unwrap(),
            0.04 / 3.0 * 10_000.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(e.calculate_op_margin_trend_bps(&series(&[0.20, 0.15])).unwrap(), -500.0, epsilon = 1e-6);
        assert!(e.calculate_op_margin_trend_bps(&[None, Some(0.14)]).is_none());
    }

    #[test]
    fn test_fcf_stability_bounds() {
        let e = engine();
        assert_abs_diff_eq!(e.calculate_fcf_stability(&series(&[50.0, 50.0, 50.0])).unwrap(), 1.0);

        let volatile = e.calculate_fcf_stability(&series(&[1.0, 1000.0, -950.0, 2.0])).unwrap();
        assert!((0.0..0.1).contains(&volatile));

        for sample in [&[10.0, -4.0][..], &[-20.0, -25.0, -22.0][..], &[1e9, 3.0, 7e8][..]] {
            let score = e.calculate_fcf_stability(&series(sample)).unwrap();
            assert!((0.0..=1.0).contains(&score), "{sample:?} -> {score}");
        }
    }

    #[test]
    fn test_fcf_stability_guards() {
        let e = engine();
        assert!(e.calculate_fcf_stability(&series(&[50.0])).is_none());
        assert!(e.calculate_fcf_stability(&[Some(50.0), None, None]).is_none());
        assert!(e.calculate_fcf_stability(&series(&[10.0, -10.0])).is_none());
        // nulls are dropped before the statistics are taken
        assert_abs_diff_eq!(e.calculate_fcf_stability(&[Some(40.0), None, Some(40.0)]).unwrap(), 1.0);
    }

    #[test]
    fn test_series_are_independent() {
        let summary = engine()
            .derive_summary(&json!({
                "revenue_history": [100, 110, 121, 133.1],
                "op_margin_history": "12%",
                "fcf_history": [50, "n/a", 48]
            }))
            .unwrap();
        assert_abs_diff_eq!(summary.revenue_cagr_3y.unwrap(), 0.10, epsilon = 1e-9);
        assert!(summary.op_margin_trend_bps_per_year.is_none());
        assert!(summary.fcf_stability_score.is_none());
    }

    #[test]
    fn test_nulls_only_allowed_as_missing_markers() {
        let raw = RawFundamentals::from_value(&json!({
            "fcf_history": [50, null, 48],
            "revenue_history": null
        }))
        .unwrap();
        assert_eq!(raw.fcf_history, Some(vec![Some(50.0), None, Some(48.0)]));
        assert!(raw.revenue_history.is_none());
        assert!(raw.op_margin_history.is_none());
    }

    #[test]
    fn test_usable_through_trait_object() {
        let deriver: Box<dyn FundamentalsDeriver> = Box::new(FundamentalAnalysisEngine::default());
        let summary = deriver.derive_summary(&json!({"fcf_history": [50, 50]})).unwrap();
        assert_abs_diff_eq!(summary.fcf_stability_score.unwrap(), 1.0);
    }
}
