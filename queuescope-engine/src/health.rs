//! Health scoring for clusters and brokers.
//!
//! Scores start at 100 and lose fixed penalties:
//!
//! | condition | penalty |
//! |---|---|
//! | offline partitions, or any unavailable broker | 50 |
//! | under-replicated partitions | 20 |
//! | unavailable-broker fraction `f` | `30 * f` |
//!
//! The result is clamped to `0..=100`. Penalties apply once no matter how
//! many members trip them, which is why they read aggregated (`max`) values.

use std::collections::BTreeMap;

use queuescope_types::{EntityType, MetricValue};

pub const MAX_SCORE: f64 = 100.0;
pub const OFFLINE_PENALTY: f64 = 50.0;
pub const UNDER_REPLICATED_PENALTY: f64 = 20.0;
pub const AVAILABILITY_PENALTY: f64 = 30.0;

/// Score boundaries for the `healthStatus` tag.
pub const HEALTHY_THRESHOLD: f64 = 80.0;
pub const WARNING_THRESHOLD: f64 = 50.0;

fn metric(metrics: &BTreeMap<String, MetricValue>, name: &str) -> Option<f64> {
    metrics.get(name).and_then(MetricValue::as_f64)
}

/// Fraction of brokers that are unavailable, in `0..=1`.
fn unavailable_fraction(entity_type: EntityType, metrics: &BTreeMap<String, MetricValue>) -> f64 {
    match entity_type {
        EntityType::Broker => match metric(metrics, "isAvailable") {
            Some(v) if v == 0.0 => 1.0,
            _ => 0.0,
        },
        EntityType::Cluster => {
            let reporting = metric(metrics, "brokerCount").unwrap_or(0.0).max(0.0);
            let configured = metric(metrics, "configuredBrokerCount").unwrap_or(0.0).max(0.0);
            let unavailable = metric(metrics, "unavailableBrokerCount").unwrap_or(0.0).max(0.0);

            let missing = (configured - reporting).max(0.0);
            // A cluster report with no broker counts still knows its unavailable brokers.
            let total = configured.max(reporting).max(unavailable);
            if total <= 0.0 {
                return 0.0;
            }
            ((unavailable + missing) / total).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// Health score for an entity, `None` for types that carry no score.
pub fn health_score(entity_type: EntityType, metrics: &BTreeMap<String, MetricValue>) -> Option<f64> {
    if !entity_type.has_health_score() {
        return None;
    }

    let positive = |name: &str| metric(metrics, name).is_some_and(|v| v > 0.0);
    let unavailable = unavailable_fraction(entity_type, metrics);

    let mut score = MAX_SCORE;
    if positive("offlinePartitionsCount") || unavailable > 0.0 {
        score -= OFFLINE_PENALTY;
    }
    if positive("underReplicatedPartitions") {
        score -= UNDER_REPLICATED_PENALTY;
    }
    score -= AVAILABILITY_PENALTY * unavailable;

    Some(score.clamp(0.0, MAX_SCORE))
}

/// `healthy`, `warning` or `critical`.
pub fn health_status(score: f64) -> &'static str {
    if score >= HEALTHY_THRESHOLD {
        "healthy"
    } else if score >= WARNING_THRESHOLD {
        "warning"
    } else {
        "critical"
    }
}
