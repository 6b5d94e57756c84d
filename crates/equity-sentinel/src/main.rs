use std::fs;
use std::path::Path;

use analysis_core::{Decision, FundamentalsSummary};
use anyhow::{Context, Result};
use fundamental_analysis::FundamentalAnalysisEngine;
use serde_json::Value;

mod config;

use config::SentinelConfig;

fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    // 2. Load configuration
    let config = SentinelConfig::from_env()?;
    tracing::info!(
        fundamentals = ?config.fundamentals_path,
        decision = ?config.decision_path,
        "Configuration loaded"
    );

    // 3. Derive the fundamentals summary
    let engine = FundamentalAnalysisEngine::new();
    let summary = match &config.fundamentals_path {
        Some(path) => {
            let raw = read_json(path)?;
            let summary = engine.derive_summary(&raw);
            match &summary {
                Some(s) => {
                    tracing::info!(
                        revenue_cagr_3y = ?s.revenue_cagr_3y,
                        op_margin_trend_bps_per_year = ?s.op_margin_trend_bps_per_year,
                        fcf_stability_score = ?s.fcf_stability_score,
                        "Fundamentals summary derived"
                    );
                    if config.print_summary_json {
                        println!("{}", serde_json::to_string_pretty(s)?);
                    }
                }
                None => tracing::warn!("No fundamentals submitted in {}", path.display()),
            }
            summary
        }
        None => None,
    };

    // 4. Validate the decision
    if let Some(path) = &config.decision_path {
        let mut data = read_json(path)?;
        if config.merge_assumptions {
            if let Some(summary) = &summary {
                let added = merge_assumptions(&mut data, summary);
                tracing::debug!(added, "Merged derived metrics into assumptions");
            }
        }

        let decision = match Decision::validate_or_raise(&data) {
            Ok(decision) => decision,
            Err(err) => {
                for violation in &err.violations {
                    tracing::error!(path = %violation.path, "{}", violation.message);
                }
                return Err(err).with_context(|| format!("{} is not a valid decision", path.display()));
            }
        };
        println!("{}", decision.short_summary());
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {} as JSON", path.display()))
}

/// Add derived metrics to `data.assumptions` without overriding caller-supplied
/// entries. Returns how many were added. A non-object `assumptions` is left for
/// validation to report.
fn merge_assumptions(data: &mut Value, summary: &FundamentalsSummary) -> usize {
    let Some(map) = data.as_object_mut() else {
        return 0;
    };
    let assumptions = map
        .entry("assumptions")
        .or_insert_with(|| Value::Object(Default::default()));
    let Some(assumptions) = assumptions.as_object_mut() else {
        return 0;
    };

    let mut added = 0;
    for (name, value) in summary.to_assumptions() {
        if assumptions.contains_key(&name) {
            continue;
        }
        if let Ok(value) = serde_json::to_value(value) {
            assumptions.insert(name, value);
            added += 1;
        }
    }
    added
}
