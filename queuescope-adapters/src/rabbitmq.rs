//! RabbitMQ transformer.
//!
//! Accepts queue, node and cluster samples. Field names follow both the
//! agent's camelCase spellings and the snake_case names of the RabbitMQ
//! Management API (`messages_ready`, `publish_details.rate`, ...), so
//! samples scraped straight from `/api/queues` transform as well.
//!
//! ## Metrics Produced
//!
//! - **Queue depth**: ready and unacknowledged messages, plus their total
//! - **Consumer count**: consumers attached to the queue
//! - **Message rates**: publish and deliver rates
//! - **Nodes**: memory, disk, file descriptors and availability
//!
//! Queues whose name starts with `amq.` are server-named and filtered
//! unless internal resources are requested.

use queuescope_types::{CanonicalMetricRecord, EntityType, Identity, ProviderKind, RawSample};

use crate::fields::{derive_sum, FieldMapping, SampleReader};
use crate::TransformError;

const DISCRIMINATORS: &[(&str, EntityType)] = &[
    ("RabbitmqQueueSample", EntityType::Queue),
    ("RabbitMQQueueSample", EntityType::Queue),
    ("RabbitmqNodeSample", EntityType::Broker),
    ("RabbitMQNodeSample", EntityType::Broker),
    ("RabbitmqClusterSample", EntityType::Cluster),
    ("RabbitMQClusterSample", EntityType::Cluster),
];

const CLUSTER: &[&str] = &[
    "clusterName",
    "cluster.name",
    "provider.clusterName",
    "cluster_name",
];
const QUEUE: &[&str] = &["queueName", "queue.name", "queue", "name"];
const NODE: &[&str] = &["nodeName", "node.name", "node", "brokerId"];

const QUEUE_METRICS: &[FieldMapping] = &[
    FieldMapping::core(
        "messagesReady",
        &["messagesReady", "queue.messagesReady", "messages_ready"],
    ),
    FieldMapping::core(
        "messagesUnacknowledged",
        &[
            "messagesUnacknowledged",
            "queue.messagesUnacknowledged",
            "messages_unacknowledged",
        ],
    ),
    FieldMapping::core("consumerCount", &["consumerCount", "queue.consumers", "consumers"]),
    FieldMapping::optional(
        "messagesPublishedRate",
        &[
            "messagesPublishedRate",
            "queue.messagesPublishedPerSecond",
            "publish_details.rate",
            "message_stats.publish_details.rate",
        ],
    ),
    FieldMapping::optional(
        "messagesDeliveredRate",
        &[
            "messagesDeliveredRate",
            "queue.messagesDeliveredPerSecond",
            "deliver_get_details.rate",
            "message_stats.deliver_get_details.rate",
        ],
    ),
    FieldMapping::optional(
        "messagesPublished",
        &["messagesPublished", "queue.totalMessagesPublished", "messages_published"],
    ),
    FieldMapping::optional(
        "messagesDelivered",
        &["messagesDelivered", "queue.totalMessagesDelivered", "messages_delivered"],
    ),
    FieldMapping::optional("memoryBytes", &["memoryBytes", "queue.memory", "memory"]),
];

const NODE_METRICS: &[FieldMapping] = &[
    FieldMapping::optional("memoryUsedBytes", &["memoryUsedBytes", "node.memoryUsed", "mem_used"]),
    FieldMapping::optional("diskFreeBytes", &["diskFreeBytes", "node.diskFree", "disk_free"]),
    FieldMapping::optional(
        "fileDescriptorsUsed",
        &["fileDescriptorsUsed", "node.fileDescriptorsUsed", "fd_used"],
    ),
    FieldMapping::optional("isAvailable", &["isAvailable", "node.running", "running"]),
    FieldMapping::optional("cpuPercent", &["cpuPercent", "node.cpuPercent"]),
];

const CLUSTER_METRICS: &[FieldMapping] = &[
    FieldMapping::optional("queueCount", &["queueCount", "object_totals.queues"]),
    FieldMapping::optional("connectionCount", &["connectionCount", "object_totals.connections"]),
    FieldMapping::optional("consumerCount", &["consumerCount", "object_totals.consumers"]),
    FieldMapping::optional(
        "messagesReady",
        &["messagesReady", "queue_totals.messages_ready"],
    ),
    FieldMapping::optional(
        "messagesUnacknowledged",
        &["messagesUnacknowledged", "queue_totals.messages_unacknowledged"],
    ),
    FieldMapping::optional("configuredBrokerCount", &["configuredBrokerCount", "nodeCount"]),
];

/// Transform a RabbitMQ sample. `Ok(None)` means the queue is internal and
/// was filtered.
pub(crate) fn transform(
    sample: &RawSample,
    include_internal: bool,
) -> Result<Option<CanonicalMetricRecord>, TransformError> {
    let entity_type = DISCRIMINATORS
        .iter()
        .find(|(kind, _)| *kind == sample.kind)
        .map(|(_, entity_type)| *entity_type)
        .ok_or_else(|| TransformError::invalid(&sample.kind, "unrecognized RabbitMQ sample type"))?;

    let mut reader = SampleReader::new(sample);
    let mut identity = Identity::cluster(reader.identity(CLUSTER).unwrap_or_default());

    let mappings = match entity_type {
        EntityType::Queue => {
            let queue = reader
                .identity(QUEUE)
                .ok_or_else(|| TransformError::invalid(&sample.kind, "missing queue name"))?;
            if !include_internal && queue.starts_with("amq.") {
                return Ok(None);
            }
            identity = identity.with_queue(queue);
            QUEUE_METRICS
        }
        EntityType::Broker => {
            let node = reader
                .identity(NODE)
                .ok_or_else(|| TransformError::invalid(&sample.kind, "missing node name"))?;
            identity = identity.with_broker(node);
            NODE_METRICS
        }
        EntityType::Cluster => CLUSTER_METRICS,
        EntityType::Topic | EntityType::ConsumerGroup => {
            return Err(TransformError::invalid(
                &sample.kind,
                "RabbitMQ has no topics or consumer groups",
            ));
        }
    };

    let mut record = CanonicalMetricRecord::new(entity_type, ProviderKind::RabbitMq, identity);
    reader.apply(mappings, &mut record);
    reader.pass_through(&mut record);

    derive_sum(
        &mut record,
        "messagesTotal",
        "messagesReady",
        "messagesUnacknowledged",
    );

    Ok(Some(record))
}
