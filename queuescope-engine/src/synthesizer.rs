//! Entity synthesis: GUIDs, golden metrics, health, cluster derivation and
//! relationships.

use std::collections::{BTreeMap, BTreeSet};

use queuescope_types::{
    AggregatedMetricRecord, CanonicalMetricRecord, Entity, EntityGuid, EntityType, Identity,
    MetricValue, ProviderKind, Relationship, RelationshipType,
};
use tracing::debug;

use crate::aggregator::Aggregator;
use crate::error::AggregationError;
use crate::health::health_score;

/// Metrics that take the worse of an explicit cluster report and its
/// member rollup.
const WORST_OF: &[&str] = &["offlinePartitionsCount", "underReplicatedPartitions"];

/// Headline metrics per entity type.
pub fn golden_metric_names(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Cluster => &[
            "brokerCount",
            "bytesInPerSecond",
            "bytesOutPerSecond",
            "messagesInPerSecond",
            "underReplicatedPartitions",
            "offlinePartitionsCount",
        ],
        EntityType::Broker => &[
            "bytesInPerSecond",
            "bytesOutPerSecond",
            "messagesInPerSecond",
            "underReplicatedPartitions",
            "cpuPercent",
        ],
        EntityType::Topic => &[
            "bytesInPerSecond",
            "bytesOutPerSecond",
            "messagesInPerSecond",
            "partitionCount",
        ],
        EntityType::Queue => &[
            "messagesReady",
            "messagesPublishedRate",
            "messagesDeliveredRate",
            "consumerCount",
        ],
        EntityType::ConsumerGroup => &["totalLag", "consumerLagMax", "memberCount"],
    }
}

/// Entities and relationships produced from one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    /// Sorted by GUID.
    pub entities: Vec<Entity>,
    /// Sorted by (source, target, kind).
    pub relationships: Vec<Relationship>,
}

/// Builds entities from aggregated records.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    account_id: String,
    generate_relationships: bool,
    aggregator: Aggregator,
}

impl Synthesizer {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            generate_relationships: true,
            aggregator: Aggregator::new(),
        }
    }

    pub fn generate_relationships(mut self, enabled: bool) -> Self {
        self.generate_relationships = enabled;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// GUID of the cluster an identity belongs to.
    pub fn cluster_guid(&self, provider: ProviderKind, identity: &Identity) -> EntityGuid {
        EntityGuid::derive(
            EntityType::Cluster,
            &self.account_id,
            provider,
            &identity.cluster_only(),
        )
    }

    /// Build one entity from one record, health computed from the record
    /// alone. Non-cluster entities list their `BELONGS_TO` edge when
    /// relationships are enabled.
    pub fn synthesize(&self, aggregated: &AggregatedMetricRecord) -> Entity {
        let mut entity = self.build(&aggregated.record);
        if self.generate_relationships && entity.entity_type != EntityType::Cluster {
            let cluster = self.cluster_guid(entity.provider, &entity.identity);
            entity.relationships = vec![Relationship::new(
                entity.guid.clone(),
                cluster,
                RelationshipType::BelongsTo,
            )];
        }
        entity
    }

    /// Build every entity in a batch, deriving clusters from their brokers,
    /// and wire relationships.
    pub fn synthesize_batch(
        &self,
        records: &[AggregatedMetricRecord],
    ) -> Result<Synthesis, AggregationError> {
        let mut entities = self.entities(records)?;
        let relationships = if self.generate_relationships {
            let edges = self.relationships(&entities);
            attach_relationships(&mut entities, &edges);
            edges
        } else {
            Vec::new()
        };

        Ok(Synthesis {
            entities,
            relationships,
        })
    }

    /// Entities for a batch without relationships, sorted by GUID.
    pub fn entities(&self, records: &[AggregatedMetricRecord]) -> Result<Vec<Entity>, AggregationError> {
        let canonical = self.with_derived_clusters(records)?;

        let mut by_guid: BTreeMap<EntityGuid, Entity> = BTreeMap::new();
        for record in &canonical {
            let entity = self.build(record);
            by_guid.insert(entity.guid.clone(), entity);
        }

        debug!(records = records.len(), entities = by_guid.len(), "synthesized entities");
        Ok(by_guid.into_values().collect())
    }

    /// `CONTAINS` and `BELONGS_TO` edges between every non-cluster entity
    /// and its cluster. The cluster GUID is referenced even when no cluster
    /// entity exists in the batch.
    pub fn relationships(&self, entities: &[Entity]) -> Vec<Relationship> {
        let mut edges = BTreeSet::new();
        for entity in entities.iter().filter(|e| e.entity_type != EntityType::Cluster) {
            let cluster = self.cluster_guid(entity.provider, &entity.identity);
            edges.insert(Relationship::new(
                cluster.clone(),
                entity.guid.clone(),
                RelationshipType::Contains,
            ));
            edges.insert(Relationship::new(
                entity.guid.clone(),
                cluster,
                RelationshipType::BelongsTo,
            ));
        }
        edges.into_iter().collect()
    }

    /// Records for the batch with derived or enriched cluster records.
    fn with_derived_clusters(
        &self,
        records: &[AggregatedMetricRecord],
    ) -> Result<Vec<CanonicalMetricRecord>, AggregationError> {
        let brokers: Vec<CanonicalMetricRecord> = records
            .iter()
            .filter(|r| r.entity_type() == EntityType::Broker)
            .map(|r| r.record.clone())
            .collect();

        let mut rollups: BTreeMap<(ProviderKind, Identity), CanonicalMetricRecord> = self
            .aggregator
            .rollup(&brokers, EntityType::Cluster)?
            .into_iter()
            .map(|a| ((a.record.provider, a.record.identity.clone()), a.record))
            .collect();

        let mut out = Vec::with_capacity(records.len() + rollups.len());
        for aggregated in records {
            let mut record = aggregated.record.clone();
            if record.entity_type == EntityType::Cluster {
                let key = (record.provider, record.identity.cluster_only());
                if let Some(rollup) = rollups.remove(&key) {
                    enrich_cluster(&mut record, rollup);
                }
            }
            out.push(record);
        }

        // Clusters seen only through their brokers
        out.extend(rollups.into_values());
        Ok(out)
    }

    fn build(&self, record: &CanonicalMetricRecord) -> Entity {
        let entity_type = record.entity_type;
        let guid = EntityGuid::derive(entity_type, &self.account_id, record.provider, &record.identity);

        let golden_metrics = golden_metric_names(entity_type)
            .iter()
            .filter_map(|name| record.metric(name).map(|v| (name.to_string(), v)))
            .collect();

        let mut tags = record.attributes.clone();
        tags.insert("provider".into(), record.provider.to_string());
        tags.insert("clusterName".into(), record.identity.cluster_name.clone());
        tags.insert("entityType".into(), entity_type.to_string());

        Entity {
            guid,
            entity_type,
            name: record.identity.display_name(entity_type),
            provider: record.provider,
            identity: record.identity.clone(),
            metrics: record.metrics.clone(),
            golden_metrics,
            health_score: health_score(entity_type, &record.metrics),
            relationships: Vec::new(),
            tags,
        }
    }
}

/// Fill gaps in an explicit cluster record from its broker rollup.
fn enrich_cluster(record: &mut CanonicalMetricRecord, rollup: CanonicalMetricRecord) {
    for (name, value) in rollup.metrics {
        let worst_of = WORST_OF.contains(&name.as_str());
        match record.metrics.get(&name) {
            None => {
                record.metrics.insert(name, value);
            }
            Some(existing) if worst_of => {
                if let (Some(a), Some(b)) = (existing.as_f64(), value.as_f64()) {
                    record.metrics.insert(name, MetricValue::Number(a.max(b)));
                }
            }
            Some(_) => {}
        }
    }
    for (key, value) in rollup.attributes {
        record.attributes.entry(key).or_insert(value);
    }
}

/// Rebuild each entity's outgoing edge list from a flat edge list.
pub fn attach_relationships(entities: &mut [Entity], edges: &[Relationship]) {
    let mut outgoing: BTreeMap<&EntityGuid, Vec<Relationship>> = BTreeMap::new();
    for edge in edges {
        outgoing.entry(&edge.source).or_default().push(edge.clone());
    }
    for entity in entities.iter_mut() {
        entity.relationships = outgoing.remove(&entity.guid).unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregated(
        entity_type: EntityType,
        provider: ProviderKind,
        identity: Identity,
        metrics: &[(&str, f64)],
    ) -> AggregatedMetricRecord {
        let mut record = CanonicalMetricRecord::new(entity_type, provider, identity);
        for (name, value) in metrics {
            record = record.with_metric(*name, *value);
        }
        AggregatedMetricRecord::single(record)
    }

    fn broker(id: &str, metrics: &[(&str, f64)]) -> AggregatedMetricRecord {
        aggregated(
            EntityType::Broker,
            ProviderKind::Kafka,
            Identity::cluster("prod").with_broker(id),
            metrics,
        )
    }

    fn find<'a>(synthesis: &'a Synthesis, entity_type: EntityType) -> Vec<&'a Entity> {
        synthesis
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    #[test]
    fn single_broker_entity() {
        let synthesizer = Synthesizer::new("12345");
        let entity = synthesizer.synthesize(&broker("1", &[("bytesInPerSecond", 1_024_000.0)]));

        assert_eq!(entity.guid.as_str(), "MESSAGE_QUEUE_BROKER|12345|kafka|prod|1");
        assert_eq!(entity.name, "prod:broker-1");
        assert_eq!(entity.health_score, Some(100.0));
        assert_eq!(entity.golden_metrics.get("bytesInPerSecond"), Some(&1_024_000.0));
        assert_eq!(entity.tag("provider"), Some("kafka"));
        assert_eq!(entity.tag("clusterName"), Some("prod"));
        assert_eq!(entity.tag("entityType"), Some("MESSAGE_QUEUE_BROKER"));
        assert_eq!(entity.relationships.len(), 1);
        assert_eq!(
            entity.relationships[0].target.as_str(),
            "MESSAGE_QUEUE_CLUSTER|12345|kafka|prod"
        );
    }

    #[test]
    fn cluster_is_derived_from_brokers() {
        let synthesizer = Synthesizer::new("0");
        let records = vec![
            broker("1", &[("underReplicatedPartitions", 5.0), ("bytesInPerSecond", 10.0)]),
            broker("2", &[("underReplicatedPartitions", 3.0), ("bytesInPerSecond", 20.0)]),
            broker("3", &[("underReplicatedPartitions", 8.0), ("bytesInPerSecond", 30.0)]),
        ];
        let synthesis = synthesizer.synthesize_batch(&records).unwrap();

        let clusters = find(&synthesis, EntityType::Cluster);
        assert_eq!(clusters.len(), 1);
        let cluster = clusters[0];
        assert_eq!(cluster.metric("underReplicatedPartitions"), Some(8.0));
        assert_eq!(cluster.metric("bytesInPerSecond"), Some(60.0));
        assert_eq!(cluster.metric("brokerCount"), Some(3.0));
        // Under-replicated penalty applied once
        assert_eq!(cluster.health_score, Some(80.0));
        assert_eq!(cluster.relationships.len(), 3);
        assert!(cluster
            .relationships
            .iter()
            .all(|r| r.kind == RelationshipType::Contains));
    }

    #[test]
    fn explicit_cluster_is_enriched() {
        let synthesizer = Synthesizer::new("0");
        let records = vec![
            aggregated(
                EntityType::Cluster,
                ProviderKind::Kafka,
                Identity::cluster("prod"),
                &[("offlinePartitionsCount", 0.0), ("underReplicatedPartitions", 2.0)],
            ),
            broker("1", &[("underReplicatedPartitions", 6.0), ("offlinePartitionsCount", 1.0)]),
        ];
        let synthesis = synthesizer.synthesize_batch(&records).unwrap();

        let clusters = find(&synthesis, EntityType::Cluster);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].metric("underReplicatedPartitions"), Some(6.0));
        assert_eq!(clusters[0].metric("offlinePartitionsCount"), Some(1.0));
        assert_eq!(clusters[0].metric("brokerCount"), Some(1.0));
        assert_eq!(clusters[0].health_score, Some(30.0));
    }

    #[test]
    fn topics_without_brokers_reference_missing_cluster() {
        let synthesizer = Synthesizer::new("0");
        let records = vec![aggregated(
            EntityType::Topic,
            ProviderKind::Kafka,
            Identity::cluster("prod").with_topic("orders"),
            &[("bytesInPerSecond", 1.0)],
        )];
        let synthesis = synthesizer.synthesize_batch(&records).unwrap();

        assert_eq!(synthesis.entities.len(), 1);
        assert_eq!(synthesis.entities[0].health_score, None);
        assert_eq!(synthesis.relationships.len(), 2);
        let contains = &synthesis.relationships[0];
        assert_eq!(contains.kind, RelationshipType::Contains);
        assert_eq!(contains.source.as_str(), "MESSAGE_QUEUE_CLUSTER|0|kafka|prod");
    }

    #[test]
    fn relationships_can_be_disabled() {
        let synthesizer = Synthesizer::new("0").generate_relationships(false);
        let synthesis = synthesizer.synthesize_batch(&[broker("1", &[])]).unwrap();

        assert!(synthesis.relationships.is_empty());
        assert!(synthesis.entities.iter().all(|e| e.relationships.is_empty()));
    }

    #[test]
    fn output_is_sorted_and_deterministic() {
        let synthesizer = Synthesizer::new("0");
        let records = vec![broker("2", &[]), broker("1", &[])];
        let a = synthesizer.synthesize_batch(&records).unwrap();
        let b = synthesizer.synthesize_batch(&records).unwrap();

        assert_eq!(a, b);
        let guids: Vec<_> = a.entities.iter().map(|e| e.guid.clone()).collect();
        let mut sorted = guids.clone();
        sorted.sort();
        assert_eq!(guids, sorted);
    }

    #[test]
    fn clusters_are_separated_by_provider() {
        let synthesizer = Synthesizer::new("0");
        let records = vec![
            broker("1", &[]),
            aggregated(
                EntityType::Broker,
                ProviderKind::RabbitMq,
                Identity::cluster("prod").with_broker("rabbit@a"),
                &[],
            ),
        ];
        let synthesis = synthesizer.synthesize_batch(&records).unwrap();
        assert_eq!(find(&synthesis, EntityType::Cluster).len(), 2);
    }

    #[test]
    fn golden_metrics_skip_missing_values() {
        let synthesizer = Synthesizer::new("0");
        let entity = synthesizer.synthesize(&aggregated(
            EntityType::Queue,
            ProviderKind::RabbitMq,
            Identity::cluster("r").with_queue("jobs"),
            &[("messagesReady", 4.0), ("somethingElse", 1.0)],
        ));
        assert_eq!(entity.golden_metrics.len(), 1);
        assert_eq!(entity.name, "r:jobs");
    }
}
