//! Synthesized entities and the relationships between them.

use std::collections::BTreeMap;
use std::fmt;

use crate::{EntityGuid, EntityType, Identity, MetricValue, ProviderKind};

/// Directed relationship kinds between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RelationshipType {
    /// Cluster to child.
    Contains,
    /// Child to cluster.
    BelongsTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::BelongsTo => "BELONGS_TO",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two entity GUIDs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Relationship {
    pub source: EntityGuid,
    pub target: EntityGuid,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: RelationshipType,
}

impl Relationship {
    pub fn new(source: EntityGuid, target: EntityGuid, kind: RelationshipType) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }
}

/// A first-class monitored object.
///
/// Entities are produced by the synthesizer from aggregated records and are
/// keyed by their [`EntityGuid`]; two entities with the same GUID describe
/// the same logical object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Entity {
    pub guid: EntityGuid,
    pub entity_type: EntityType,
    pub name: String,
    pub provider: ProviderKind,
    pub identity: Identity,
    pub metrics: BTreeMap<String, MetricValue>,
    /// The subset of numeric metrics that best summarizes this entity type.
    pub golden_metrics: BTreeMap<String, f64>,
    /// 0..=100, clusters and brokers only.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub health_score: Option<f64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub relationships: Vec<Relationship>,
    pub tags: BTreeMap<String, String>,
}

impl Entity {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_f64)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}
