//! # Prometheus Metrics — Settlement Observability
//!
//! Exposes operational metrics in the Prometheus text exposition format for
//! scraping by Prometheus, Grafana Agent, or any OpenMetrics-compatible
//! collector.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `validated_rounds_extended_total` | Counter | — | Deadline extensions granted |
//! | `validated_guarantees_satisfied_total` | Counter | — | Sweep checks that needed no action |
//! | `validated_winners_selected_total` | Counter | — | Winner rows materialized |
//! | `validated_payouts_total` | Counter | `outcome` | Payout attempts by completed/failed |
//! | `validated_http_request_duration_seconds` | Histogram | `method`, `path` | API latency |
//!
//! Counters are bumped by the API handlers as each operation reports its
//! outcome; the `/metrics` endpoint renders the registry on each scrape.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Label set for payout attempt outcomes.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct OutcomeLabel {
    pub outcome: String,
}

/// Label set for the HTTP request duration histogram.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

/// Thread-safe metrics registry for the settlement backend.
///
/// All fields are atomic and safe to update from any async task. The
/// `Family` type creates per-label-set instances on first use.
pub struct Metrics {
    pub registry: Registry,
    pub rounds_extended: Counter,
    pub guarantees_satisfied: Counter,
    pub winners_selected: Counter,
    pub payouts: Family<OutcomeLabel, Counter>,
    pub http_request_duration: Family<HttpLabel, Histogram>,
}

impl Metrics {
    /// Create a new registry with all settlement metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let rounds_extended = Counter::default();
        registry.register(
            "validated_rounds_extended",
            "Deadline extensions granted by the guarantee monitor",
            rounds_extended.clone(),
        );

        let guarantees_satisfied = Counter::default();
        registry.register(
            "validated_guarantees_satisfied",
            "Guarantee checks that required no extension",
            guarantees_satisfied.clone(),
        );

        let winners_selected = Counter::default();
        registry.register(
            "validated_winners_selected",
            "Winner records materialized by winner selection",
            winners_selected.clone(),
        );

        let payouts = Family::<OutcomeLabel, Counter>::default();
        registry.register(
            "validated_payouts",
            "Payout attempts by outcome",
            payouts.clone(),
        );

        let http_request_duration = Family::<HttpLabel, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.005, 2.0, 12))
        });
        registry.register(
            "validated_http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_request_duration.clone(),
        );

        Self {
            registry,
            rounds_extended,
            guarantees_satisfied,
            winners_selected,
            payouts,
            http_request_duration,
        }
    }

    /// Bump the payout counter for one outcome ("completed" or "failed").
    pub fn record_payout(&self, outcome: &str, count: u64) {
        self.payouts
            .get_or_create(&OutcomeLabel {
                outcome: outcome.to_string(),
            })
            .inc_by(count);
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        // Encoding only fails on a malformed registry, which is static here.
        let _ = encode(&mut out, &self.registry);
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metrics() {
        let m = Metrics::new();
        m.rounds_extended.inc();
        m.record_payout("completed", 3);
        let text = m.encode();
        assert!(text.contains("validated_rounds_extended_total 1"));
        assert!(text.contains("validated_payouts_total"));
        assert!(text.contains("outcome=\"completed\""));
    }
}
