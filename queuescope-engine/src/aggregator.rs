//! Metric aggregation.
//!
//! Records describing the same logical entity are grouped and each metric is
//! reduced by the rule its name selects (see [`crate::rules`]).

use std::collections::BTreeMap;

use queuescope_types::{
    AggregatedMetricRecord, CanonicalMetricRecord, EntityType, Identity, MetricValue, ProviderKind,
};
use tracing::debug;

use crate::error::AggregationError;
use crate::rules::{rule_for, AggregationRule};

type GroupKey = (EntityType, ProviderKind, Identity);

/// Groups canonical records and reduces their metrics.
#[derive(Debug, Clone, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Aggregator
    }

    /// One output per `(entity_type, provider, identity)` group, ordered by
    /// group key.
    pub fn aggregate(
        &self,
        records: &[CanonicalMetricRecord],
    ) -> Result<Vec<AggregatedMetricRecord>, AggregationError> {
        let mut groups: BTreeMap<GroupKey, Vec<&CanonicalMetricRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.group_key()).or_default().push(record);
        }

        let out = groups
            .into_iter()
            .map(|((entity_type, provider, identity), members)| {
                reduce_group(entity_type, provider, identity, &members)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(records = records.len(), groups = out.len(), "aggregated records");
        Ok(out)
    }

    /// Regroup member records at a coarser level.
    ///
    /// Each member's identity is projected onto `level` (for clusters: the
    /// cluster name alone) and records are reduced per projected identity and
    /// provider. Records that do not carry the level's identity are skipped.
    /// Cluster rollups also report `brokerCount`, the number of distinct
    /// reporting brokers, and when brokers report them, the number of
    /// controllers and unavailable brokers.
    pub fn rollup(
        &self,
        records: &[CanonicalMetricRecord],
        level: EntityType,
    ) -> Result<Vec<AggregatedMetricRecord>, AggregationError> {
        let mut groups: BTreeMap<(ProviderKind, Identity), Vec<&CanonicalMetricRecord>> =
            BTreeMap::new();
        for record in records {
            if let Some(identity) = project(&record.identity, level) {
                groups.entry((record.provider, identity)).or_default().push(record);
            }
        }

        groups
            .into_iter()
            .map(|((provider, identity), members)| {
                let mut aggregated = reduce_group(level, provider, identity, &members)?;
                if level == EntityType::Cluster {
                    add_broker_counts(&mut aggregated.record, &members);
                    drop_broker_flags(&mut aggregated.record);
                }
                Ok(aggregated)
            })
            .collect()
    }
}

fn project(identity: &Identity, level: EntityType) -> Option<Identity> {
    let base = identity.cluster_only();
    match level {
        EntityType::Cluster => Some(base),
        EntityType::Broker => identity.broker_id.clone().map(|b| base.with_broker(b)),
        EntityType::Topic => identity.topic_name.clone().map(|t| base.with_topic(t)),
        EntityType::Queue => identity.queue_name.clone().map(|q| base.with_queue(q)),
        EntityType::ConsumerGroup => identity
            .consumer_group
            .clone()
            .map(|g| base.with_consumer_group(g)),
    }
}

fn reduce_group(
    entity_type: EntityType,
    provider: ProviderKind,
    identity: Identity,
    members: &[&CanonicalMetricRecord],
) -> Result<AggregatedMetricRecord, AggregationError> {
    let mut values: BTreeMap<&str, Vec<&MetricValue>> = BTreeMap::new();
    let mut record = CanonicalMetricRecord::new(entity_type, provider, identity);

    for member in members {
        for (name, value) in &member.metrics {
            values.entry(name.as_str()).or_default().push(value);
        }
        for (key, value) in &member.attributes {
            record.attributes.insert(key.clone(), value.clone());
        }
    }

    for (name, values) in values {
        let reduced = reduce(name, rule_for(name), &values)?;
        record.metrics.insert(name.to_string(), reduced);
    }

    Ok(AggregatedMetricRecord {
        record,
        source_count: members.len(),
    })
}

/// Reduce the values of one metric, given in input order.
///
/// A single value is kept as reported. Numeric rules skip values with no
/// numeric view and fail only when none is left.
pub fn reduce(
    metric: &str,
    rule: AggregationRule,
    values: &[&MetricValue],
) -> Result<MetricValue, AggregationError> {
    if let [only] = values {
        if !rule.is_numeric() || only.as_f64().is_some() {
            return Ok((*only).clone());
        }
    }

    if rule == AggregationRule::Latest {
        return values
            .last()
            .map(|v| (*v).clone())
            .ok_or_else(|| mismatch(metric, rule));
    }

    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    if numbers.is_empty() {
        return Err(mismatch(metric, rule));
    }

    let reduced = match rule {
        AggregationRule::Sum => numbers.iter().sum(),
        AggregationRule::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationRule::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
        AggregationRule::Latest => numbers[numbers.len() - 1],
    };
    Ok(MetricValue::Number(reduced))
}

fn mismatch(metric: &str, rule: AggregationRule) -> AggregationError {
    AggregationError::RuleMismatch {
        metric: metric.to_string(),
        rule: rule.as_str(),
    }
}

fn add_broker_counts(record: &mut CanonicalMetricRecord, members: &[&CanonicalMetricRecord]) {
    // Latest report per broker
    let mut brokers: BTreeMap<&str, &CanonicalMetricRecord> = BTreeMap::new();
    for member in members {
        if let Some(id) = member.identity.broker_id.as_deref() {
            brokers.insert(id, member);
        }
    }
    if brokers.is_empty() {
        return;
    }

    record
        .metrics
        .insert("brokerCount".into(), MetricValue::Number(brokers.len() as f64));

    let flagged = |name: &str, expected: f64| -> Option<usize> {
        if !brokers.values().any(|r| r.metric(name).is_some()) {
            return None;
        }
        Some(
            brokers
                .values()
                .filter(|r| r.metric(name) == Some(expected))
                .count(),
        )
    };

    if let Some(controllers) = flagged("isController", 1.0) {
        record.metrics.insert(
            "activeControllerCount".into(),
            MetricValue::Number(controllers as f64),
        );
    }
    if let Some(unavailable) = flagged("isAvailable", 0.0) {
        record.metrics.insert(
            "unavailableBrokerCount".into(),
            MetricValue::Number(unavailable as f64),
        );
    }
}

/// Per-broker state flags (`isController`, `isAvailable`, ...) describe one
/// broker; on a cluster they only survive as the counts above.
fn drop_broker_flags(record: &mut CanonicalMetricRecord) {
    record.metrics.retain(|name, _| {
        let flag = name
            .strip_prefix("is")
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_uppercase());
        !(flag && rule_for(name) == AggregationRule::Latest)
    });
}
