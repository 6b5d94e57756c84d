use std::fmt;

use thiserror::Error;

/// A single broken constraint, located by its field path
/// (e.g. `technicals.rsi_14`, `citations[1].type`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Schema validation failure for a contract model. Carries every violation
/// found, not just the first.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} validation error(s) for {model}: {}", .violations.len(), render(.violations))]
pub struct ValidationError {
    pub model: &'static str,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(model: &'static str, violations: Vec<Violation>) -> Self {
        Self { model, violations }
    }

    /// True when some violation sits at exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
