//! Per-destination delivery outcomes.

use crate::error::{DeliveryError, DeliveryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with the remaining destinations after one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Stop at the first failure; later destinations are skipped.
    FailFast,
    /// Attempt every destination and report all failures together.
    #[default]
    BestEffort,
}

impl fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => f.write_str("fail-fast"),
            Self::BestEffort => f.write_str("best-effort"),
        }
    }
}

impl FromStr for DeliveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(Self::FailFast),
            "best-effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown delivery policy: {other}")),
        }
    }
}

/// Result of one destination attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Delivered,
    Failed { reason: String },
    /// Not attempted because an earlier destination failed under fail-fast.
    Skipped,
}

/// The outcome for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationOutcome {
    /// Human-readable destination, e.g. `host:22` or a base URL.
    pub target: String,
    pub status: OutcomeStatus,
    /// HTTP status code, for web destinations that answered.
    pub http_status: Option<u16>,
}

impl DestinationOutcome {
    pub fn delivered(target: impl Into<String>, http_status: Option<u16>) -> Self {
        Self {
            target: target.into(),
            status: OutcomeStatus::Delivered,
            http_status,
        }
    }

    pub fn failed(target: impl Into<String>, error: &DeliveryError) -> Self {
        Self {
            target: target.into(),
            status: OutcomeStatus::Failed {
                reason: error.to_string(),
            },
            http_status: error.http_status(),
        }
    }

    pub fn skipped(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: OutcomeStatus::Skipped,
            http_status: None,
        }
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, OutcomeStatus::Delivered)
    }
}

/// Outcomes of one fan-out, in destination order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    outcomes: Vec<DestinationOutcome>,
}

impl DeliveryReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: DestinationOutcome) {
        self.outcomes.push(outcome);
    }

    #[must_use]
    pub fn outcomes(&self) -> &[DestinationOutcome] {
        &self.outcomes
    }

    /// Destinations that were actually tried.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.status, OutcomeStatus::Skipped))
            .count()
    }

    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    /// Outcomes that were not delivered, skipped ones included.
    pub fn failures(&self) -> impl Iterator<Item = &DestinationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_delivered())
    }

    /// True when every destination was delivered.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(DestinationOutcome::is_delivered)
    }

    /// Turns any non-delivered destination into an error.
    pub fn into_result(self) -> DeliveryResult<Self> {
        let failed = self.failures().count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(DeliveryError::Incomplete {
                failed,
                total: self.outcomes.len(),
            })
        }
    }
}

impl Extend<DestinationOutcome> for DeliveryReport {
    fn extend<I: IntoIterator<Item = DestinationOutcome>>(&mut self, iter: I) {
        self.outcomes.extend(iter);
    }
}
