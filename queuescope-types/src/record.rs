//! Canonical, provider-agnostic metric records.

use std::collections::BTreeMap;

use crate::{EntityType, Identity, ProviderKind};

/// A single canonical metric value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetricValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric view used by the reducing aggregation rules.
    ///
    /// Flags count as 0/1, numeric text is parsed, anything else has no
    /// numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            MetricValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            MetricValue::Number(n) => n.is_finite(),
            _ => true,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Flag(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// Output of the provider transformer: one per accepted raw sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CanonicalMetricRecord {
    pub entity_type: EntityType,
    pub provider: ProviderKind,
    pub identity: Identity,
    /// Canonical metric name to value.
    pub metrics: BTreeMap<String, MetricValue>,
    /// Passthrough string fields.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "BTreeMap::is_empty")
    )]
    pub attributes: BTreeMap<String, String>,
}

impl CanonicalMetricRecord {
    pub fn new(entity_type: EntityType, provider: ProviderKind, identity: Identity) -> Self {
        Self {
            entity_type,
            provider,
            identity,
            metrics: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set a metric, replacing any previous value.
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Numeric view of a metric, if present.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_f64)
    }

    /// Key that groups records describing the same logical entity.
    pub fn group_key(&self) -> (EntityType, ProviderKind, Identity) {
        (self.entity_type, self.provider, self.identity.clone())
    }
}

/// One canonical record per logical entity, reduced from `source_count`
/// input records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AggregatedMetricRecord {
    pub record: CanonicalMetricRecord,
    pub source_count: usize,
}

impl AggregatedMetricRecord {
    /// Wrap a single record that needed no reduction.
    pub fn single(record: CanonicalMetricRecord) -> Self {
        Self {
            record,
            source_count: 1,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.record.entity_type
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.record.metric(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_view_of_values() {
        assert_eq!(MetricValue::Number(3.5).as_f64(), Some(3.5));
        assert_eq!(MetricValue::Flag(true).as_f64(), Some(1.0));
        assert_eq!(MetricValue::Flag(false).as_f64(), Some(0.0));
        assert_eq!(MetricValue::from("12").as_f64(), Some(12.0));
        assert_eq!(MetricValue::from("ACTIVE").as_f64(), None);
    }

    #[test]
    fn non_finite_numbers_are_flagged() {
        assert!(!MetricValue::Number(f64::NAN).is_finite());
        assert!(!MetricValue::Number(f64::INFINITY).is_finite());
        assert!(MetricValue::Flag(true).is_finite());
    }

    #[test]
    fn record_builder_and_lookup() {
        let record = CanonicalMetricRecord::new(
            EntityType::Broker,
            ProviderKind::Kafka,
            Identity::cluster("prod").with_broker("1"),
        )
        .with_metric("bytesInPerSecond", 1024.0)
        .with_metric("isController", true)
        .with_attribute("kafkaVersion", "3.6.0");

        assert_eq!(record.metric("bytesInPerSecond"), Some(1024.0));
        assert_eq!(record.metric("isController"), Some(1.0));
        assert_eq!(record.metric("missing"), None);
        assert_eq!(record.attributes.get("kafkaVersion").map(String::as_str), Some("3.6.0"));
    }

    #[test]
    fn group_key_ignores_metrics() {
        let identity = Identity::cluster("prod").with_broker("1");
        let a = CanonicalMetricRecord::new(EntityType::Broker, ProviderKind::Kafka, identity.clone())
            .with_metric("x", 1.0);
        let b = CanonicalMetricRecord::new(EntityType::Broker, ProviderKind::Kafka, identity)
            .with_metric("x", 2.0);
        assert_eq!(a.group_key(), b.group_key());
    }
}
