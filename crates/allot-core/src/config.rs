#![forbid(unsafe_code)]

//! Deployment configuration.
//!
//! [`GameConfig`] collects every constant a deployment may tune. Defaults
//! reproduce the reference installation: a $32M budget split across five
//! buckets.

use std::fmt;
use std::time::Duration;

use crate::money::{Amount, Denomination};

/// Default total budget.
pub const DEFAULT_BUDGET: Amount = 32_000_000;
/// Default convergence tolerance for the arc solver, in scene units.
pub const DEFAULT_ARC_TOLERANCE: f64 = 0.5;
/// Default relaxation iteration cap for the arc solver.
pub const DEFAULT_ARC_MAX_ITERATIONS: usize = 10_000;
/// Default quiet period before state is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
/// Schema version written alongside persisted state.
pub const SCHEMA_VERSION: &str = "0";

/// Errors reported by [`GameConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Budget must be positive.
    ZeroBudget,
    /// At least two buckets are required.
    TooFewBuckets(usize),
    /// Tolerance must be positive and finite.
    InvalidTolerance(f64),
    /// A denomination has zero value.
    ZeroDenomination(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBudget => write!(f, "total budget must be positive"),
            Self::TooFewBuckets(n) => write!(f, "need at least 2 buckets, got {n}"),
            Self::InvalidTolerance(t) => write!(f, "arc tolerance must be positive, got {t}"),
            Self::ZeroDenomination(label) => write!(f, "denomination {label} has zero value"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for one deployment of the exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    /// Total budget to distribute.
    pub total_budget: Amount,
    /// Full bucket labels, one per bucket. May contain line breaks.
    pub bucket_labels: Vec<String>,
    /// Draggable cash stacks.
    pub denominations: Vec<Denomination>,
    /// Arc solver tolerance (max − min chord length).
    pub arc_tolerance: f64,
    /// Arc solver iteration cap.
    pub arc_max_iterations: usize,
    /// Quiet period before a persist is written.
    pub debounce: Duration,
    /// Schema version stamped on persisted state.
    pub schema_version: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            total_budget: DEFAULT_BUDGET,
            bucket_labels: vec![
                "Housing\nAffordability".into(),
                "Transit &\nMobility".into(),
                "Parks &\nOpen Space".into(),
                "Small Business\nSupport".into(),
                "Community\nServices".into(),
            ],
            denominations: Denomination::reference_set(),
            arc_tolerance: DEFAULT_ARC_TOLERANCE,
            arc_max_iterations: DEFAULT_ARC_MAX_ITERATIONS,
            debounce: DEFAULT_DEBOUNCE,
            schema_version: SCHEMA_VERSION.into(),
        }
    }
}

impl GameConfig {
    /// Number of buckets.
    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_labels.len()
    }

    /// Labels with line breaks flattened to spaces, as used in exports.
    #[must_use]
    pub fn flat_labels(&self) -> Vec<String> {
        self.bucket_labels
            .iter()
            .map(|l| l.replace('\n', " "))
            .collect()
    }

    /// Set the total budget.
    #[must_use]
    pub fn with_budget(mut self, budget: Amount) -> Self {
        self.total_budget = budget;
        self
    }

    /// Replace the bucket labels (and therefore the bucket count).
    #[must_use]
    pub fn with_bucket_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bucket_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Use `count` generically named buckets.
    #[must_use]
    pub fn with_bucket_count(self, count: usize) -> Self {
        self.with_bucket_labels((1..=count).map(|i| format!("Bucket {i}")))
    }

    /// Set the arc tolerance.
    #[must_use]
    pub fn with_arc_tolerance(mut self, tolerance: f64) -> Self {
        self.arc_tolerance = tolerance;
        self
    }

    /// Set the debounce window.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.bucket_count() < 2 {
            return Err(ConfigError::TooFewBuckets(self.bucket_count()));
        }
        if !(self.arc_tolerance.is_finite() && self.arc_tolerance > 0.0) {
            return Err(ConfigError::InvalidTolerance(self.arc_tolerance));
        }
        if let Some(d) = self.denominations.iter().find(|d| d.value == 0) {
            return Err(ConfigError::ZeroDenomination(d.label.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_reference_deployment() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.total_budget, 32_000_000);
        assert_eq!(cfg.bucket_count(), 5);
        assert_eq!(cfg.arc_tolerance, 0.5);
        assert_eq!(cfg.debounce, Duration::from_millis(300));
        assert_eq!(cfg.schema_version, "0");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn flat_labels_replace_newlines() {
        let cfg = GameConfig::default().with_bucket_labels(["A\nB", "C"]);
        assert_eq!(cfg.flat_labels(), vec!["A B", "C"]);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert_eq!(
            GameConfig::default().with_budget(0).validate(),
            Err(ConfigError::ZeroBudget)
        );
        assert_eq!(
            GameConfig::default().with_bucket_count(1).validate(),
            Err(ConfigError::TooFewBuckets(1))
        );
        assert!(matches!(
            GameConfig::default().with_arc_tolerance(0.0).validate(),
            Err(ConfigError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::ZeroDenomination("$0".into());
        assert_eq!(err.to_string(), "denomination $0 has zero value");
    }
}
