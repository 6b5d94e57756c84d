use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::ValidationError;
use crate::schema::{self, FromSchema, Model, ObjectReader};
use crate::types::{
    schema_model, AssumptionValue, Catalyst, MonitoringRule, Recommendation, RiskRating, Citation,
    Scenarios, Sentiment, Technicals, Valuation,
};

pub const DEFAULT_HORIZON_MONTHS: u32 = 12;

/// Canonical output of the pipeline, read by every downstream consumer.
///
/// Obtain one through [`Decision::validate_or_raise`] (or serde, which routes
/// through the same checks). A value built field by field should be passed
/// through [`Model::validated`] before it is handed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Decision {
    /// Date the analysis is based on, `YYYY-MM-DD` on the wire.
    pub as_of: NaiveDate,
    pub ticker: String,
    pub recommendation: Recommendation,
    pub target_price_12m: f64,
    pub expected_total_return_pct: f64,
    pub horizon_months: u32,
    pub risk_rating: RiskRating,

    /// Top 2-5 arguments for the call.
    pub thesis: Vec<String>,
    /// Top 2-5 risks that could impair the call.
    pub key_risks: Vec<String>,
    pub catalysts_next_6_12m: Vec<Catalyst>,

    #[validate(nested)]
    pub valuation: Valuation,
    #[validate(nested)]
    pub scenarios: Scenarios,

    #[validate(nested)]
    pub technicals: Technicals,
    #[validate(nested)]
    pub sentiment: Sentiment,

    pub citations: Vec<Citation>,
    /// Explicit inputs, e.g. `rev_cagr_3y`, `capex_pct_sales`.
    pub assumptions: BTreeMap<String, AssumptionValue>,
    pub monitoring: Vec<MonitoringRule>,

    /// Charts, sensitivity tables and other passthroughs; opaque here.
    pub artifacts: Option<BTreeMap<String, Value>>,
}

impl Decision {
    /// Validate an untyped nested mapping into a `Decision`, reporting every
    /// violated field path at once.
    pub fn validate_or_raise(data: &Value) -> Result<Self, ValidationError> {
        let decision: Self = schema::parse(data)?;
        tracing::debug!(
            ticker = %decision.ticker,
            recommendation = %decision.recommendation,
            "decision validated"
        );
        Ok(decision)
    }

    /// One-liner for logs and CLI output.
    pub fn short_summary(&self) -> String {
        format!(
            "{} | {} → {} @ {:.2} ({:.1}% / {}m, risk={})",
            self.as_of,
            self.ticker,
            self.recommendation,
            self.target_price_12m,
            self.expected_total_return_pct,
            self.horizon_months,
            self.risk_rating
        )
    }

    pub fn assumption(&self, name: &str) -> Option<&AssumptionValue> {
        self.assumptions.get(name)
    }
}

impl FromSchema for Decision {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let as_of = r.required("as_of");
        let ticker = r.required("ticker");
        let recommendation = r.required("recommendation");
        let target_price_12m = r.required("target_price_12m");
        let expected_total_return_pct = r.required("expected_total_return_pct");
        let horizon_months = r.or_else("horizon_months", || DEFAULT_HORIZON_MONTHS);
        let risk_rating = r.required("risk_rating");
        let thesis = r.required("thesis");
        let key_risks = r.required("key_risks");
        let catalysts_next_6_12m = r.object_list("catalysts_next_6_12m", true);
        let valuation = r.object("valuation");
        let scenarios = r.object("scenarios");
        let technicals = r.object("technicals");
        let sentiment = r.object("sentiment");
        let citations = r.object_list("citations", true);
        let assumptions = r.entries("assumptions", "a number or a string");
        let monitoring = r.object_list("monitoring", true);
        let artifacts = r.optional("artifacts");

        Some(Self {
            as_of: as_of?,
            ticker: ticker?,
            recommendation: recommendation?,
            target_price_12m: target_price_12m?,
            expected_total_return_pct: expected_total_return_pct?,
            horizon_months: horizon_months?,
            risk_rating: risk_rating?,
            thesis: thesis?,
            key_risks: key_risks?,
            catalysts_next_6_12m: catalysts_next_6_12m?,
            valuation: valuation?,
            scenarios: scenarios?,
            technicals: technicals?,
            sentiment: sentiment?,
            citations: citations?,
            assumptions: assumptions?,
            monitoring: monitoring?,
            artifacts: artifacts?,
        })
    }
}

impl Model for Decision {
    const MODEL: &'static str = "Decision";
}

schema_model!(Decision);
