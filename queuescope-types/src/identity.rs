//! Entity types and the identity fields that distinguish one entity from another.

use std::fmt;

/// Cluster identity used when a sample does not name its cluster.
pub const DEFAULT_CLUSTER: &str = "default";

/// The kinds of entity the synthesizer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityType {
    #[cfg_attr(feature = "serde", serde(rename = "MESSAGE_QUEUE_CLUSTER"))]
    Cluster,
    #[cfg_attr(feature = "serde", serde(rename = "MESSAGE_QUEUE_BROKER"))]
    Broker,
    #[cfg_attr(feature = "serde", serde(rename = "MESSAGE_QUEUE_TOPIC"))]
    Topic,
    #[cfg_attr(feature = "serde", serde(rename = "MESSAGE_QUEUE_QUEUE"))]
    Queue,
    #[cfg_attr(feature = "serde", serde(rename = "MESSAGE_QUEUE_CONSUMER_GROUP"))]
    ConsumerGroup,
}

impl EntityType {
    /// Stable type string, the first segment of every GUID.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Cluster => "MESSAGE_QUEUE_CLUSTER",
            EntityType::Broker => "MESSAGE_QUEUE_BROKER",
            EntityType::Topic => "MESSAGE_QUEUE_TOPIC",
            EntityType::Queue => "MESSAGE_QUEUE_QUEUE",
            EntityType::ConsumerGroup => "MESSAGE_QUEUE_CONSUMER_GROUP",
        }
    }

    /// Only clusters and brokers carry a health score.
    pub fn has_health_score(&self) -> bool {
        matches!(self, EntityType::Cluster | EntityType::Broker)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity fields of a record or entity.
///
/// Ordered so that records can key deterministic maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Identity {
    pub cluster_name: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub broker_id: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub topic_name: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub queue_name: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub consumer_group: Option<String>,
}

impl Identity {
    /// Identity of a cluster. Blank names fall back to [`DEFAULT_CLUSTER`].
    pub fn cluster(name: impl Into<String>) -> Self {
        let name = name.into();
        let cluster_name = if name.trim().is_empty() {
            DEFAULT_CLUSTER.to_string()
        } else {
            name
        };
        Self {
            cluster_name,
            broker_id: None,
            topic_name: None,
            queue_name: None,
            consumer_group: None,
        }
    }

    pub fn with_broker(mut self, id: impl Into<String>) -> Self {
        self.broker_id = Some(id.into());
        self
    }

    pub fn with_topic(mut self, name: impl Into<String>) -> Self {
        self.topic_name = Some(name.into());
        self
    }

    pub fn with_queue(mut self, name: impl Into<String>) -> Self {
        self.queue_name = Some(name.into());
        self
    }

    pub fn with_consumer_group(mut self, name: impl Into<String>) -> Self {
        self.consumer_group = Some(name.into());
        self
    }

    /// The cluster this identity belongs to, stripped of everything else.
    pub fn cluster_only(&self) -> Identity {
        Identity::cluster(self.cluster_name.clone())
    }

    /// Ordered identity chain for an entity type, empty segments dropped.
    pub fn chain(&self, entity_type: EntityType) -> Vec<&str> {
        let leaf = match entity_type {
            EntityType::Cluster => None,
            EntityType::Broker => self.broker_id.as_deref(),
            EntityType::Topic => self.topic_name.as_deref(),
            EntityType::Queue => self.queue_name.as_deref(),
            EntityType::ConsumerGroup => self.consumer_group.as_deref(),
        };

        std::iter::once(self.cluster_name.as_str())
            .chain(leaf)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Human readable entity name.
    pub fn display_name(&self, entity_type: EntityType) -> String {
        match entity_type {
            EntityType::Cluster => self.cluster_name.clone(),
            EntityType::Broker => format!(
                "{}:broker-{}",
                self.cluster_name,
                self.broker_id.as_deref().unwrap_or_default()
            ),
            _ => match self.chain(entity_type).get(1) {
                Some(leaf) => format!("{}:{}", self.cluster_name, leaf),
                None => self.cluster_name.clone(),
            },
        }
    }
}
