use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use validator::Validate;

use crate::error::ValidationError;
use crate::schema::{FromSchema, Model, ObjectReader};

/// Closed set of string literals with their exact wire spelling.
macro_rules! literal_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $lit:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $lit)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $lit),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// `from_value` plus serde deserialization routed through the validating reader.
macro_rules! schema_model {
    ($name:ident) => {
        impl $name {
            /// Validate an untyped JSON mapping into this model.
            pub fn from_value(value: &serde_json::Value) -> Result<Self, $crate::error::ValidationError> {
                $crate::schema::parse(value)
            }
        }

        impl TryFrom<serde_json::Value> for $name {
            type Error = $crate::error::ValidationError;

            fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
                $crate::schema::parse(&value)
            }
        }
    };
}

pub(crate) use literal_enum;
pub(crate) use schema_model;

literal_enum!(
    RiskRating { Low => "Low", Medium => "Medium", High => "High" }
);

literal_enum!(
    Recommendation { Buy => "BUY", Hold => "HOLD", Sell => "SELL" }
);

literal_enum!(
    Trend { Up => "Up", Down => "Down", Sideways => "Sideways" }
);

literal_enum!(
    /// 50-day vs 200-day moving average relationship.
    MaCross { GoldenCross => "50>200", DeathCross => "50<200", None => "none" }
);

literal_enum!(
    AnalystConsensus { Buy => "Buy", Hold => "Hold", Sell => "Sell" }
);

literal_enum!(
    Impact { Low => "Low", Medium => "Medium", High => "High" }
);

literal_enum!(
    CitationKind { Filing => "filing", News => "news", Api => "api" }
);

literal_enum!(
    ScenarioKind { Bull => "bull", Base => "base", Bear => "bear" }
);

impl Default for Impact {
    fn default() -> Self {
        Impact::Medium
    }
}

/// Key technical price levels.
///
/// Levels are documented as ascending but the order is not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Levels {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

impl FromSchema for Levels {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let support = r.or_default("support");
        let resistance = r.or_default("resistance");
        Some(Self {
            support: support?,
            resistance: resistance?,
        })
    }
}

impl Model for Levels {
    const MODEL: &'static str = "Levels";
}

schema_model!(Levels);

/// A potential value-moving event in the next 6-12 months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Catalyst {
    pub event: String,
    /// e.g. "Q1–Q2" or a date range
    pub window: String,
    pub impact: Impact,
}

impl FromSchema for Catalyst {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let event = r.required("event");
        let window = r.required("window");
        let impact = r.or_default("impact");
        Some(Self {
            event: event?,
            window: window?,
            impact: impact?,
        })
    }
}

impl Model for Catalyst {
    const MODEL: &'static str = "Catalyst";
}

schema_model!(Catalyst);

/// Traceability record for a fact or number used in the thesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Citation {
    #[serde(rename = "type")]
    pub kind: CitationKind,
    pub id: String,
    pub url: Option<Url>,
    /// Section within the source, e.g. "MD&A".
    pub loc: Option<String>,
}

impl FromSchema for Citation {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let kind = r.required("type");
        let id = r.required("id");
        let url = r.optional("url");
        let loc = r.optional("loc");
        Some(Self {
            kind: kind?,
            id: id?,
            url: url?,
            loc: loc?,
        })
    }
}

impl Model for Citation {
    const MODEL: &'static str = "Citation";
}

schema_model!(Citation);

/// Falsifiable trigger that would change the recommendation if breached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct MonitoringRule {
    pub metric: String,
    pub threshold: String,
    pub action: String,
}

impl FromSchema for MonitoringRule {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let metric = r.required("metric");
        let threshold = r.required("threshold");
        let action = r.required("action");
        Some(Self {
            metric: metric?,
            threshold: threshold?,
            action: action?,
        })
    }
}

impl Model for MonitoringRule {
    const MODEL: &'static str = "MonitoringRule";
}

schema_model!(MonitoringRule);

/// Summarized technical state of the equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Technicals {
    pub trend: Trend,
    pub ma_cross: MaCross,
    #[validate(range(min = 0.0, max = 100.0))]
    pub rsi_14: f64,
    pub levels: Levels,
    pub ma_20: Option<f64>,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub atr_14: Option<f64>,
}

impl Technicals {
    /// Technicals with only the required fields set.
    pub fn new(trend: Trend, ma_cross: MaCross, rsi_14: f64, levels: Levels) -> Result<Self, ValidationError> {
        Self {
            trend,
            ma_cross,
            rsi_14,
            levels,
            ma_20: None,
            ma_50: None,
            ma_200: None,
            macd_line: None,
            macd_signal: None,
            atr_14: None,
        }
        .validated()
    }
}

impl FromSchema for Technicals {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let trend = r.required("trend");
        let ma_cross = r.required("ma_cross");
        let rsi_14 = r.required("rsi_14");
        let levels = r.object("levels");
        let ma_20 = r.optional("ma_20");
        let ma_50 = r.optional("ma_50");
        let ma_200 = r.optional("ma_200");
        let macd_line = r.optional("macd_line");
        let macd_signal = r.optional("macd_signal");
        let atr_14 = r.optional("atr_14");
        Some(Self {
            trend: trend?,
            ma_cross: ma_cross?,
            rsi_14: rsi_14?,
            levels: levels?,
            ma_20: ma_20?,
            ma_50: ma_50?,
            ma_200: ma_200?,
            macd_line: macd_line?,
            macd_signal: macd_signal?,
            atr_14: atr_14?,
        })
    }
}

impl Model for Technicals {
    const MODEL: &'static str = "Technicals";
}

schema_model!(Technicals);

/// Street view, positioning and media tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Sentiment {
    pub analyst_consensus: AnalystConsensus,
    pub avg_target: Option<f64>,
    #[validate(range(min = 0.0))]
    pub short_interest_pct_float: Option<f64>,
    pub insider_net_buy_90d: Option<f64>,
    /// Normalized tone, typically -1..=1.
    pub news_sentiment_score: Option<f64>,
    pub delta_analyst_upgrades_90d: Option<i64>,
    pub delta_avg_target_90d: Option<f64>,
}

impl Sentiment {
    pub fn new(analyst_consensus: AnalystConsensus) -> Self {
        Self {
            analyst_consensus,
            avg_target: None,
            short_interest_pct_float: None,
            insider_net_buy_90d: None,
            news_sentiment_score: None,
            delta_analyst_upgrades_90d: None,
            delta_avg_target_90d: None,
        }
    }
}

impl FromSchema for Sentiment {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let analyst_consensus = r.required("analyst_consensus");
        let avg_target = r.optional("avg_target");
        let short_interest_pct_float = r.optional("short_interest_pct_float");
        let insider_net_buy_90d = r.optional("insider_net_buy_90d");
        let news_sentiment_score = r.optional("news_sentiment_score");
        let delta_analyst_upgrades_90d = r.optional("delta_analyst_upgrades_90d");
        let delta_avg_target_90d = r.optional("delta_avg_target_90d");
        Some(Self {
            analyst_consensus: analyst_consensus?,
            avg_target: avg_target?,
            short_interest_pct_float: short_interest_pct_float?,
            insider_net_buy_90d: insider_net_buy_90d?,
            news_sentiment_score: news_sentiment_score?,
            delta_analyst_upgrades_90d: delta_analyst_upgrades_90d?,
            delta_avg_target_90d: delta_avg_target_90d?,
        })
    }
}

impl Model for Sentiment {
    const MODEL: &'static str = "Sentiment";
}

schema_model!(Sentiment);

/// Value and earnings under one path, with its probability weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Scenario {
    #[validate(range(min = 0.0, max = 1.0))]
    pub prob: f64,
    pub eps: Option<f64>,
    pub fair_value: f64,
}

impl Scenario {
    pub fn new(prob: f64, eps: Option<f64>, fair_value: f64) -> Result<Self, ValidationError> {
        Self { prob, eps, fair_value }.validated()
    }
}

impl FromSchema for Scenario {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let prob = r.required("prob");
        let eps = r.optional("eps");
        let fair_value = r.required("fair_value");
        Some(Self {
            prob: prob?,
            eps: eps?,
            fair_value: fair_value?,
        })
    }
}

impl Model for Scenario {
    const MODEL: &'static str = "Scenario";
}

schema_model!(Scenario);

/// The bull/base/bear triple. The probabilities are expected to sum to ~1.0
/// but only callers check that; see [`Scenarios::probability_sum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Scenarios {
    #[validate(nested)]
    pub bull: Scenario,
    #[validate(nested)]
    pub base: Scenario,
    #[validate(nested)]
    pub bear: Scenario,
}

impl Scenarios {
    pub fn get(&self, kind: ScenarioKind) -> &Scenario {
        match kind {
            ScenarioKind::Bull => &self.bull,
            ScenarioKind::Base => &self.base,
            ScenarioKind::Bear => &self.bear,
        }
    }

    /// Scenarios in bull, base, bear order.
    pub fn iter(&self) -> impl Iterator<Item = (ScenarioKind, &Scenario)> {
        [ScenarioKind::Bull, ScenarioKind::Base, ScenarioKind::Bear]
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }

    pub fn probability_sum(&self) -> f64 {
        self.iter().map(|(_, s)| s.prob).sum()
    }

    /// Probability-weighted fair value, normalized by the probability sum.
    /// `None` when every probability is zero.
    pub fn weighted_fair_value(&self) -> Option<f64> {
        let total = self.probability_sum();
        if total <= 0.0 {
            return None;
        }
        let weighted: f64 = self.iter().map(|(_, s)| s.prob * s.fair_value).sum();
        Some(weighted / total)
    }
}

impl FromSchema for Scenarios {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        r.deny_unknown(&["bull", "base", "bear"]);
        let bull = r.object("bull");
        let base = r.object("base");
        let bear = r.object("bear");
        Some(Self {
            bull: bull?,
            base: base?,
            bear: bear?,
        })
    }
}

impl Model for Scenarios {
    const MODEL: &'static str = "Scenarios";
}

schema_model!(Scenarios);

/// DCF, multiples and blended valuation outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct Valuation {
    pub dcf_fair_value: Option<f64>,
    pub multiples_fair_value: Option<f64>,
    pub blended: f64,
    #[validate(range(min = 0.0))]
    pub wacc: Option<f64>,
    pub terminal_g: Option<f64>,
    pub peer_multiples_used: Vec<String>,
}

impl Valuation {
    pub fn new(blended: f64) -> Self {
        Self {
            dcf_fair_value: None,
            multiples_fair_value: None,
            blended,
            wacc: None,
            terminal_g: None,
            peer_multiples_used: Vec::new(),
        }
    }
}

impl FromSchema for Valuation {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let dcf_fair_value = r.optional("dcf_fair_value");
        let multiples_fair_value = r.optional("multiples_fair_value");
        let blended = r.required("blended");
        let wacc = r.optional("wacc");
        let terminal_g = r.optional("terminal_g");
        let peer_multiples_used = r.or_default("peer_multiples_used");
        Some(Self {
            dcf_fair_value: dcf_fair_value?,
            multiples_fair_value: multiples_fair_value?,
            blended: blended?,
            wacc: wacc?,
            terminal_g: terminal_g?,
            peer_multiples_used: peer_multiples_used?,
        })
    }
}

impl Model for Valuation {
    const MODEL: &'static str = "Valuation";
}

schema_model!(Valuation);

/// An explicit input behind the call: a number or a short description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssumptionValue {
    Number(f64),
    Text(String),
}

impl From<f64> for AssumptionValue {
    fn from(value: f64) -> Self {
        AssumptionValue::Number(value)
    }
}

impl From<&str> for AssumptionValue {
    fn from(value: &str) -> Self {
        AssumptionValue::Text(value.to_string())
    }
}

impl From<String> for AssumptionValue {
    fn from(value: String) -> Self {
        AssumptionValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_literals_match_wire_spelling() {
        assert_eq!(serde_json::to_value(MaCross::GoldenCross).unwrap(), json!("50>200"));
        assert_eq!(serde_json::to_value(Recommendation::Hold).unwrap(), json!("HOLD"));
        assert_eq!(serde_json::to_value(CitationKind::Api).unwrap(), json!("api"));
        assert_eq!(MaCross::None.to_string(), "none");
        let cross: MaCross = serde_json::from_value(json!("50<200")).unwrap();
        assert_eq!(cross, MaCross::DeathCross);
    }

    #[test]
    fn test_unknown_literal_rejected() {
        assert!(serde_json::from_value::<Recommendation>(json!("Buy")).is_err());
        assert!(serde_json::from_value::<MaCross>(json!("50=200")).is_err());
    }

    #[test]
    fn test_technicals_rsi_bounds() {
        let levels = Levels {
            support: vec![90.0],
            resistance: vec![110.0],
        };
        let good = Technicals::new(Trend::Sideways, MaCross::None, 58.0, levels.clone()).unwrap();
        assert_abs_diff_eq!(good.rsi_14, 58.0);
        assert!(!good.levels.support.is_empty() && !good.levels.resistance.is_empty());

        let err = Technicals::new(Trend::Up, MaCross::GoldenCross, 150.0, levels).unwrap_err();
        assert_eq!(err.model, "Technicals");
        assert!(err.has_path("rsi_14"));
    }

    #[test]
    fn test_technicals_from_value_reports_nested_paths() {
        let err = Technicals::from_value(&json!({
            "trend": "Flat",
            "ma_cross": "none",
            "rsi_14": 50.0,
            "levels": {"support": "low"}
        }))
        .unwrap_err();
        assert_eq!(err.paths(), vec!["trend", "levels.support"]);
    }

    #[test]
    fn test_sentiment_minimal_and_bounds() {
        let sent = Sentiment::from_value(&json!({"analyst_consensus": "Hold"})).unwrap();
        assert_eq!(sent.analyst_consensus, AnalystConsensus::Hold);
        assert!(sent.avg_target.is_none());

        let short = Sentiment {
            short_interest_pct_float: Some(-0.5),
            ..Sentiment::new(AnalystConsensus::Sell)
        };
        assert!(short.check().unwrap_err().has_path("short_interest_pct_float"));
    }

    #[test]
    fn test_delta_upgrades_must_be_integer() {
        let err = Sentiment::from_value(&json!({
            "analyst_consensus": "Buy",
            "delta_analyst_upgrades_90d": 1.5
        }))
        .unwrap_err();
        assert!(err.has_path("delta_analyst_upgrades_90d"));
    }

    #[test]
    fn test_valuation_requires_blended() {
        let val = Valuation {
            dcf_fair_value: Some(100.0),
            multiples_fair_value: Some(110.0),
            wacc: Some(0.09),
            terminal_g: Some(0.02),
            peer_multiples_used: vec!["EV/EBITDA".to_string()],
            ..Valuation::new(105.0)
        }
        .validated()
        .unwrap();
        assert_abs_diff_eq!(val.blended, 105.0);

        let err = Valuation::from_value(&json!({"dcf_fair_value": 100.0, "wacc": -0.01})).unwrap_err();
        assert!(err.has_path("blended"));
        // bounds are only checked once the structure is readable
        assert!(!err.has_path("wacc"));
    }

    #[test]
    fn test_scenario_prob_bounds() {
        assert!(Scenario::new(0.5, None, 100.0).is_ok());
        assert!(Scenario::new(1.2, Some(4.0), 100.0).unwrap_err().has_path("prob"));
        assert!(Scenario::new(-0.1, None, 100.0).is_err());
    }

    #[test]
    fn test_scenarios_helpers() {
        let scenarios = Scenarios {
            bull: Scenario::new(0.25, Some(6.1), 150.0).unwrap(),
            base: Scenario::new(0.50, Some(5.2), 121.0).unwrap(),
            bear: Scenario::new(0.25, Some(4.1), 95.0).unwrap(),
        };
        assert_abs_diff_eq!(scenarios.probability_sum(), 1.0, epsilon = 1e-9);
        let expected = 0.25 * 150.0 + 0.5 * 121.0 + 0.25 * 95.0;
        assert_abs_diff_eq!(scenarios.weighted_fair_value().unwrap(), expected, epsilon = 1e-9);
        let kinds: Vec<_> = scenarios.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![ScenarioKind::Bull, ScenarioKind::Base, ScenarioKind::Bear]);
    }

    #[test]
    fn test_scenarios_reject_unknown_and_missing_keys() {
        let err = Scenarios::from_value(&json!({
            "bull": {"prob": 0.3, "fair_value": 150.0},
            "base": {"prob": 1.4, "fair_value": 120.0},
            "upside": {"prob": 0.1, "fair_value": 200.0}
        }))
        .unwrap_err();
        assert!(err.has_path("upside"));
        assert!(err.has_path("bear"));
    }

    #[test]
    fn test_citation_url_must_be_absolute() {
        let ok = Citation::from_value(&json!({"type": "filing", "id": "10Q", "url": "https://example.com/10q"})).unwrap();
        assert_eq!(ok.kind, CitationKind::Filing);
        assert_eq!(ok.url.as_ref().map(Url::as_str), Some("https://example.com/10q"));

        let err = Citation::from_value(&json!({"type": "blog", "id": "x", "url": "/relative"})).unwrap_err();
        assert_eq!(err.paths(), vec!["type", "url"]);
    }

    #[test]
    fn test_catalyst_impact_defaults_to_medium() {
        let c = Catalyst::from_value(&json!({"event": "Product refresh", "window": "Q4"})).unwrap();
        assert_eq!(c.impact, Impact::Medium);
    }

    #[test]
    fn test_deserialize_goes_through_validation() {
        let parsed: Result<Scenario, _> = serde_json::from_value(json!({"prob": 2.0, "fair_value": 1.0}));
        let message = parsed.unwrap_err().to_string();
        assert!(message.contains("prob"));
    }

    #[test]
    fn test_assumption_values_untagged() {
        let n: AssumptionValue = serde_json::from_value(json!(8.5)).unwrap();
        let t: AssumptionValue = serde_json::from_value(json!("expanding 80bps/yr")).unwrap();
        assert_eq!(n, AssumptionValue::Number(8.5));
        assert_eq!(t, AssumptionValue::from("expanding 80bps/yr"));
        assert!(serde_json::from_value::<AssumptionValue>(json!(true)).is_err());
    }
}
