//! Prometheus counters for the two engines.

use std::fmt;

use domains::DomainError;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Accepted,
    Verified,
    Cooldown,
    Suspicious,
    InsufficientFunds,
    Conflict,
    Rejected,
}

impl Outcome {
    fn from_error(err: &DomainError) -> Self {
        match err {
            DomainError::Cooldown { .. } => Outcome::Cooldown,
            DomainError::SuspiciousActivity(_) => Outcome::Suspicious,
            DomainError::InsufficientFunds { .. } => Outcome::InsufficientFunds,
            DomainError::Conflict(_) => Outcome::Conflict,
            _ => Outcome::Rejected,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: Outcome,
}

pub struct Metrics {
    registry: Registry,
    votes: Family<OutcomeLabels, Counter>,
    checkouts: Family<OutcomeLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let votes = Family::<OutcomeLabels, Counter>::default();
        let checkouts = Family::<OutcomeLabels, Counter>::default();
        registry.register("fanhub_votes", "Votes by outcome", votes.clone());
        registry.register("fanhub_checkouts", "Checkouts by outcome", checkouts.clone());
        Self {
            registry,
            votes,
            checkouts,
        }
    }

    /// `verified` is true when the vote flipped the code to verified.
    pub fn record_vote(&self, result: Result<bool, &DomainError>) {
        let outcome = match result {
            Ok(true) => Outcome::Verified,
            Ok(false) => Outcome::Accepted,
            Err(e) => Outcome::from_error(e),
        };
        self.votes.get_or_create(&OutcomeLabels { outcome }).inc();
    }

    pub fn record_checkout(&self, result: Result<(), &DomainError>) {
        let outcome = match result {
            Ok(()) => Outcome::Accepted,
            Err(e) => Outcome::from_error(e),
        };
        self.checkouts.get_or_create(&OutcomeLabels { outcome }).inc();
    }

    /// Prometheus text exposition.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = Metrics::new();
        metrics.record_vote(Ok(true));
        metrics.record_vote(Err(&DomainError::Cooldown { retry_after_secs: 3 }));
        metrics.record_checkout(Err(&DomainError::InsufficientFunds {
            required: 500,
            available: 300,
        }));

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"fanhub_votes_total{outcome="Verified"} 1"#));
        assert!(text.contains(r#"fanhub_votes_total{outcome="Cooldown"} 1"#));
        assert!(text.contains(r#"fanhub_checkouts_total{outcome="InsufficientFunds"} 1"#));
    }
}
