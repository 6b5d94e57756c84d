use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    // Inputs
    pub fundamentals_path: Option<PathBuf>, // raw revenue / margin / FCF series
    pub decision_path: Option<PathBuf>,     // decision mapping to validate

    // Output
    pub print_summary_json: bool, // print the derived FundamentalsSummary
    pub merge_assumptions: bool,  // fold derived metrics into decision.assumptions
}

impl SentinelConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            fundamentals_path: env::var("SENTINEL_FUNDAMENTALS_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            decision_path: env::var("SENTINEL_DECISION_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),

            print_summary_json: env::var("SENTINEL_PRINT_SUMMARY_JSON")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("SENTINEL_PRINT_SUMMARY_JSON must be true or false")?,
            merge_assumptions: env::var("SENTINEL_MERGE_ASSUMPTIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("SENTINEL_MERGE_ASSUMPTIONS must be true or false")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fundamentals_path.is_none() && self.decision_path.is_none() {
            bail!("set SENTINEL_FUNDAMENTALS_PATH and/or SENTINEL_DECISION_PATH");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_an_input() {
        let config = SentinelConfig {
            fundamentals_path: None,
            decision_path: None,
            print_summary_json: true,
            merge_assumptions: true,
        };
        assert!(config.validate().is_err());

        let config = SentinelConfig {
            decision_path: Some(PathBuf::from("decision.json")),
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
