use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::schema::{FromSchema, Model, ObjectReader};
use crate::types::{literal_enum, schema_model, AssumptionValue};

/// Snapshot derived from financial statements for downstream valuation.
///
/// Every field is independently optional; a missing series only blanks its
/// own metric. `gross_margin_trend_bps_per_year` and the balance-sheet ratios
/// are reserved for producers that do not exist yet and stay `None` when the
/// summary comes from the fundamentals engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_cagr_3y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_margin_trend_bps_per_year: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op_margin_trend_bps_per_year: Option<f64>,
    /// 0..=1, lower FCF variance gives a higher score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcf_stability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_debt_to_ebitda: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roe: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl FundamentalsSummary {
    /// Populated numeric fields keyed by field name, ready to be merged into
    /// `Decision::assumptions`.
    pub fn to_assumptions(&self) -> BTreeMap<String, AssumptionValue> {
        [
            ("revenue_cagr_3y", self.revenue_cagr_3y),
            ("gross_margin_trend_bps_per_year", self.gross_margin_trend_bps_per_year),
            ("op_margin_trend_bps_per_year", self.op_margin_trend_bps_per_year),
            ("fcf_stability_score", self.fcf_stability_score),
            ("net_debt_to_ebitda", self.net_debt_to_ebitda),
            ("current_ratio", self.current_ratio),
            ("roe", self.roe),
            ("roic", self.roic),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), AssumptionValue::Number(v))))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_assumptions().is_empty() && self.notes.is_none()
    }
}

literal_enum!(
    MacroTrend { Rising => "Rising", Falling => "Falling", Stable => "Stable" }
);

literal_enum!(
    FxImpact { Headwind => "Headwind", Tailwind => "Tailwind", Neutral => "Neutral" }
);

/// Lightweight macro/industry context used to condition valuations and scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(try_from = "Value")]
pub struct MacroIndustrySummary {
    pub rate_regime: Option<MacroTrend>,
    pub inflation_trend: Option<MacroTrend>,
    pub fx_headwind_tailwind: Option<FxImpact>,
    pub commodity_links: Vec<String>,
    pub sector: Option<String>,
    pub notes: Option<String>,
}

impl MacroIndustrySummary {
    /// e.g. `"Semiconductors | rate=Rising | inflation=Stable"`
    pub fn brief(&self) -> String {
        let mut parts = Vec::new();
        if let Some(sector) = self.sector.as_deref().filter(|s| !s.is_empty()) {
            parts.push(sector.to_string());
        }
        if let Some(rate) = self.rate_regime {
            parts.push(format!("rate={rate}"));
        }
        if let Some(inflation) = self.inflation_trend {
            parts.push(format!("inflation={inflation}"));
        }
        if parts.is_empty() {
            "macro: <no summary>".to_string()
        } else {
            parts.join(" | ")
        }
    }
}

impl FromSchema for MacroIndustrySummary {
    fn read(r: &mut ObjectReader<'_>) -> Option<Self> {
        let rate_regime = r.optional("rate_regime");
        let inflation_trend = r.optional("inflation_trend");
        let fx_headwind_tailwind = r.optional("fx_headwind_tailwind");
        let commodity_links = r.or_default("commodity_links");
        let sector = r.optional("sector");
        let notes = r.optional("notes");
        Some(Self {
            rate_regime: rate_regime?,
            inflation_trend: inflation_trend?,
            fx_headwind_tailwind: fx_headwind_tailwind?,
            commodity_links: commodity_links?,
            sector: sector?,
            notes: notes?,
        })
    }
}

impl Model for MacroIndustrySummary {
    const MODEL: &'static str = "MacroIndustrySummary";
}

schema_model!(MacroIndustrySummary);
