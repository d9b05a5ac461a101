//! Kafka transformer.
//!
//! Handles broker, topic, consumer group and cluster samples from Kafka
//! agents, including the `AwsMsk*` samples emitted for managed clusters.
//!
//! ## Metrics Produced
//!
//! - **Brokers**: byte and message throughput, under-replicated partitions, controller state
//! - **Topics**: byte and message throughput, partition count
//! - **Consumer groups**: total and max lag, member count
//! - **Clusters**: broker counts, controller count, offline partitions
//!
//! Topics whose name starts with `__` (for example `__consumer_offsets`) and
//! consumer groups starting with `_` are internal and filtered unless
//! internal resources are requested.

use queuescope_types::{CanonicalMetricRecord, EntityType, Identity, ProviderKind, RawSample};

use crate::fields::{derive_sum, FieldMapping, SampleReader};
use crate::TransformError;

const DISCRIMINATORS: &[(&str, EntityType)] = &[
    ("KafkaBrokerSample", EntityType::Broker),
    ("AwsMskBrokerSample", EntityType::Broker),
    ("KafkaTopicSample", EntityType::Topic),
    ("AwsMskTopicSample", EntityType::Topic),
    ("KafkaOffsetSample", EntityType::ConsumerGroup),
    ("KafkaConsumerSample", EntityType::ConsumerGroup),
    ("KafkaConsumerGroupSample", EntityType::ConsumerGroup),
    ("KafkaClusterSample", EntityType::Cluster),
    ("AwsMskClusterSample", EntityType::Cluster),
];

const CLUSTER: &[&str] = &[
    "clusterName",
    "cluster.name",
    "provider.clusterName",
    "aws.msk.clusterName",
];
const BROKER: &[&str] = &["brokerId", "broker.id", "provider.brokerId", "aws.msk.broker"];
const TOPIC: &[&str] = &["topic", "topicName", "topic.name", "provider.topic"];
const CONSUMER_GROUP: &[&str] = &[
    "consumerGroup",
    "consumerGroupName",
    "consumer.group",
    "provider.consumerGroup",
];

const BROKER_METRICS: &[FieldMapping] = &[
    FieldMapping::core(
        "bytesInPerSecond",
        &[
            "bytesInPerSecond",
            "broker.bytesInPerSecond",
            "broker.IOInPerSecond",
            "provider.bytesInPerSec.Average",
        ],
    ),
    FieldMapping::core(
        "bytesOutPerSecond",
        &[
            "bytesOutPerSecond",
            "broker.bytesOutPerSecond",
            "broker.IOOutPerSecond",
            "provider.bytesOutPerSec.Average",
        ],
    ),
    FieldMapping::core(
        "messagesInPerSecond",
        &[
            "messagesInPerSecond",
            "broker.messagesInPerSecond",
            "provider.messagesInPerSec.Average",
        ],
    ),
    FieldMapping::core(
        "underReplicatedPartitions",
        &[
            "underReplicatedPartitions",
            "replication.unreplicatedPartitions",
            "broker.underReplicatedPartitions",
            "provider.underReplicatedPartitions.Maximum",
        ],
    ),
    FieldMapping::optional("partitionCount", &["partitionCount", "broker.partitionCount"]),
    FieldMapping::optional(
        "offlinePartitionsCount",
        &["offlinePartitionsCount", "cluster.offlinePartitionsCount"],
    ),
    FieldMapping::optional("isController", &["isController", "broker.isController"]),
    FieldMapping::optional("isAvailable", &["isAvailable", "broker.isAvailable"]),
    FieldMapping::optional(
        "cpuPercent",
        &["cpuPercent", "broker.cpuPercent", "provider.cpuUser.Average"],
    ),
    FieldMapping::optional("memoryPercent", &["memoryPercent", "broker.memoryPercent"]),
    FieldMapping::optional(
        "requestLatencyMs",
        &["requestLatencyMs", "request.avgTimeProduceRequest"],
    ),
];

const TOPIC_METRICS: &[FieldMapping] = &[
    FieldMapping::core(
        "bytesInPerSecond",
        &[
            "bytesInPerSecond",
            "topic.bytesInPerSecond",
            "provider.bytesInPerSec.Sum",
        ],
    ),
    FieldMapping::core(
        "bytesOutPerSecond",
        &[
            "bytesOutPerSecond",
            "topic.bytesOutPerSecond",
            "provider.bytesOutPerSec.Sum",
        ],
    ),
    FieldMapping::core(
        "messagesInPerSecond",
        &[
            "messagesInPerSecond",
            "topic.messagesInPerSecond",
            "provider.messagesInPerSec.Sum",
        ],
    ),
    FieldMapping::optional(
        "partitionCount",
        &["partitionCount", "topic.partitionsCount", "topic.partitionCount"],
    ),
    FieldMapping::optional(
        "underReplicatedPartitions",
        &["underReplicatedPartitions", "topic.underReplicatedPartitions"],
    ),
    FieldMapping::optional(
        "replicationFactor",
        &["replicationFactor", "topic.replicationFactor"],
    ),
];

const CONSUMER_GROUP_METRICS: &[FieldMapping] = &[
    FieldMapping::core(
        "totalLag",
        &["totalLag", "consumer.totalLag", "consumerGroup.totalLag", "lag"],
    ),
    FieldMapping::core(
        "consumerLagMax",
        &["consumerLagMax", "consumer.maxLag", "consumerGroup.maxLag", "maxLag"],
    ),
    FieldMapping::optional(
        "memberCount",
        &["memberCount", "consumerGroup.activeConsumers", "consumer.count"],
    ),
    FieldMapping::optional(
        "messagesConsumedPerSecond",
        &["messagesConsumedPerSecond", "consumer.messageConsumptionPerSecond"],
    ),
];

const CLUSTER_METRICS: &[FieldMapping] = &[
    FieldMapping::core(
        "offlinePartitionsCount",
        &["offlinePartitionsCount", "cluster.offlinePartitionsCount"],
    ),
    FieldMapping::core(
        "underReplicatedPartitions",
        &["underReplicatedPartitions", "cluster.underReplicatedPartitions"],
    ),
    FieldMapping::optional(
        "activeControllerCount",
        &[
            "activeControllerCount",
            "cluster.activeControllerCount",
            "broker.ActiveControllerCount",
        ],
    ),
    FieldMapping::optional("brokerCount", &["brokerCount", "cluster.brokerCount"]),
    FieldMapping::optional(
        "configuredBrokerCount",
        &["configuredBrokerCount", "provider.numberOfBrokerNodes"],
    ),
    FieldMapping::optional(
        "unavailableBrokerCount",
        &["unavailableBrokerCount", "cluster.unavailableBrokerCount"],
    ),
    FieldMapping::optional(
        "globalPartitionCount",
        &["globalPartitionCount", "broker.GlobalPartitionCount"],
    ),
    FieldMapping::optional("bytesInPerSecond", &["bytesInPerSecond", "cluster.bytesInPerSecond"]),
    FieldMapping::optional(
        "bytesOutPerSecond",
        &["bytesOutPerSecond", "cluster.bytesOutPerSecond"],
    ),
];

/// Transform a Kafka sample. `Ok(None)` means the sample names an internal
/// resource and was filtered.
pub(crate) fn transform(
    sample: &RawSample,
    include_internal: bool,
) -> Result<Option<CanonicalMetricRecord>, TransformError> {
    let entity_type = DISCRIMINATORS
        .iter()
        .find(|(kind, _)| *kind == sample.kind)
        .map(|(_, entity_type)| *entity_type)
        .ok_or_else(|| TransformError::invalid(&sample.kind, "unrecognized Kafka sample type"))?;

    let mut reader = SampleReader::new(sample);
    let mut identity = Identity::cluster(reader.identity(CLUSTER).unwrap_or_default());

    let mappings = match entity_type {
        EntityType::Broker => {
            let id = reader
                .identity(BROKER)
                .ok_or_else(|| TransformError::invalid(&sample.kind, "missing broker id"))?;
            identity = identity.with_broker(id);
            BROKER_METRICS
        }
        EntityType::Topic => {
            let topic = reader
                .identity(TOPIC)
                .ok_or_else(|| TransformError::invalid(&sample.kind, "missing topic name"))?;
            if !include_internal && topic.starts_with("__") {
                return Ok(None);
            }
            identity = identity.with_topic(topic);
            TOPIC_METRICS
        }
        EntityType::ConsumerGroup => {
            let group = reader
                .identity(CONSUMER_GROUP)
                .ok_or_else(|| TransformError::invalid(&sample.kind, "missing consumer group"))?;
            if !include_internal && group.starts_with('_') {
                return Ok(None);
            }
            identity = identity.with_consumer_group(group);
            // Offset samples are per partition; the topic is kept as an attribute
            CONSUMER_GROUP_METRICS
        }
        EntityType::Cluster => CLUSTER_METRICS,
        EntityType::Queue => {
            return Err(TransformError::invalid(&sample.kind, "Kafka has no queues"));
        }
    };

    let mut record = CanonicalMetricRecord::new(entity_type, ProviderKind::Kafka, identity);
    reader.apply(mappings, &mut record);
    reader.pass_through(&mut record);

    if entity_type != EntityType::ConsumerGroup {
        derive_sum(
            &mut record,
            "bytesTotalPerSecond",
            "bytesInPerSecond",
            "bytesOutPerSecond",
        );
    }

    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuescope_types::MetricValue;

    fn broker_sample() -> RawSample {
        RawSample::builder("KafkaBrokerSample")
            .field("clusterName", "prod")
            .field("brokerId", 1)
            .field("bytesInPerSecond", 1_024_000.0)
            .field("broker.bytesOutPerSecond", 2_048_000.0)
            .field("kafkaVersion", "3.6.0")
            .build()
    }

    #[test]
    fn broker_sample_maps_to_canonical_record() {
        let record = transform(&broker_sample(), false).unwrap().unwrap();

        assert_eq!(record.entity_type, EntityType::Broker);
        assert_eq!(record.provider, ProviderKind::Kafka);
        assert_eq!(record.identity, Identity::cluster("prod").with_broker("1"));
        assert_eq!(record.metric("bytesInPerSecond"), Some(1_024_000.0));
        assert_eq!(record.metric("bytesOutPerSecond"), Some(2_048_000.0));
        assert_eq!(record.metric("bytesTotalPerSecond"), Some(3_072_000.0));
        // Core metric absent from the sample
        assert_eq!(record.metric("underReplicatedPartitions"), Some(0.0));
        assert_eq!(record.attributes.get("kafkaVersion").map(String::as_str), Some("3.6.0"));
    }

    #[test]
    fn alternate_spellings_are_accepted() {
        let sample = RawSample::builder("AwsMskBrokerSample")
            .field("provider.clusterName", "msk-prod")
            .field("broker.id", "2")
            .field("broker.IOInPerSecond", 10.0)
            .field("broker.isController", true)
            .build();
        let record = transform(&sample, false).unwrap().unwrap();

        assert_eq!(record.identity.cluster_name, "msk-prod");
        assert_eq!(record.identity.broker_id.as_deref(), Some("2"));
        assert_eq!(record.metric("bytesInPerSecond"), Some(10.0));
        assert_eq!(record.metrics.get("isController"), Some(&MetricValue::Flag(true)));
    }

    #[test]
    fn missing_cluster_defaults() {
        let sample = RawSample::builder("KafkaBrokerSample").field("brokerId", 1).build();
        let record = transform(&sample, false).unwrap().unwrap();
        assert_eq!(record.identity.cluster_name, "default");
    }

    #[test]
    fn missing_broker_id_is_invalid() {
        let sample = RawSample::builder("KafkaBrokerSample").field("clusterName", "prod").build();
        assert!(matches!(
            transform(&sample, false),
            Err(TransformError::InvalidSample { .. })
        ));
    }

    #[test]
    fn unknown_discriminator_is_invalid() {
        let sample = RawSample::new("KafkaSomethingSample");
        assert!(matches!(
            transform(&sample, false),
            Err(TransformError::InvalidSample { .. })
        ));
        assert!(transform(&RawSample::new(""), false).is_err());
    }

    #[test]
    fn internal_topics_are_filtered() {
        let sample = RawSample::builder("KafkaTopicSample")
            .field("clusterName", "prod")
            .field("topic", "__consumer_offsets")
            .build();
        assert_eq!(transform(&sample, false), Ok(None));

        let record = transform(&sample, true).unwrap().unwrap();
        assert_eq!(record.identity.topic_name.as_deref(), Some("__consumer_offsets"));
    }

    #[test]
    fn internal_consumer_groups_are_filtered() {
        let sample = RawSample::builder("KafkaOffsetSample")
            .field("clusterName", "prod")
            .field("consumerGroup", "_confluent-controlcenter")
            .field("consumer.totalLag", 40.0)
            .build();
        assert_eq!(transform(&sample, false), Ok(None));
    }

    #[test]
    fn consumer_group_lag() {
        let sample = RawSample::builder("KafkaOffsetSample")
            .field("clusterName", "prod")
            .field("consumerGroup", "billing")
            .field("topic", "orders")
            .field("consumer.totalLag", 40.0)
            .field("consumer.maxLag", 25.0)
            .build();
        let record = transform(&sample, false).unwrap().unwrap();

        assert_eq!(record.entity_type, EntityType::ConsumerGroup);
        assert_eq!(record.metric("totalLag"), Some(40.0));
        assert_eq!(record.metric("consumerLagMax"), Some(25.0));
        assert_eq!(record.attributes.get("topic").map(String::as_str), Some("orders"));
        assert!(!record.metrics.contains_key("bytesTotalPerSecond"));
    }
}
