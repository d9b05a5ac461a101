//! Data passed through hooks and middleware.

use std::collections::BTreeMap;
use std::fmt;

use queuescope_types::{AggregatedMetricRecord, CanonicalMetricRecord, Entity, RawSample, Relationship};

use crate::hooks::ExtensionPoint;
use crate::pipeline::CycleReport;

/// The payload at a pipeline stage. Hooks must hand back the same variant
/// they were given.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineData {
    Samples(Vec<RawSample>),
    Records(Vec<CanonicalMetricRecord>),
    Aggregated(Vec<AggregatedMetricRecord>),
    Entities(Vec<Entity>),
    Relationships(Vec<Relationship>),
    Failure(FailureNotice),
    Report(CycleReport),
}

impl PipelineData {
    /// Variant name, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineData::Samples(_) => "samples",
            PipelineData::Records(_) => "records",
            PipelineData::Aggregated(_) => "aggregated",
            PipelineData::Entities(_) => "entities",
            PipelineData::Relationships(_) => "relationships",
            PipelineData::Failure(_) => "failure",
            PipelineData::Report(_) => "report",
        }
    }

    /// Number of items carried, 1 for notices and reports.
    pub fn len(&self) -> usize {
        match self {
            PipelineData::Samples(v) => v.len(),
            PipelineData::Records(v) => v.len(),
            PipelineData::Aggregated(v) => v.len(),
            PipelineData::Entities(v) => v.len(),
            PipelineData::Relationships(v) => v.len(),
            PipelineData::Failure(_) | PipelineData::Report(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! payload_conversions {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PipelineData {
                fn from(value: $ty) -> Self {
                    PipelineData::$variant(value)
                }
            }

            impl TryFrom<PipelineData> for $ty {
                type Error = PipelineData;

                fn try_from(data: PipelineData) -> Result<Self, Self::Error> {
                    match data {
                        PipelineData::$variant(value) => Ok(value),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

payload_conversions! {
    Samples => Vec<RawSample>,
    Records => Vec<CanonicalMetricRecord>,
    Aggregated => Vec<AggregatedMetricRecord>,
    Entities => Vec<Entity>,
    Relationships => Vec<Relationship>,
    Failure => FailureNotice,
    Report => CycleReport,
}

/// A failure dispatched to the `error`, `validation-error` and
/// `transformation-error` extension points.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureNotice {
    /// Where the failure happened.
    pub point: ExtensionPoint,
    /// What failed: a hook name, a sample discriminator or a metric name.
    pub source: String,
    pub message: String,
    /// Position in the batch, when the failure concerns one item.
    pub index: Option<usize>,
}

impl FailureNotice {
    pub fn new(point: ExtensionPoint, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            point,
            source: source.into(),
            message: message.into(),
            index: None,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for FailureNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.source, self.point, self.message)
    }
}

/// Context handed to every hook and middleware invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub point: ExtensionPoint,
    /// Cycle number, starting at 1. Zero outside a pipeline cycle.
    pub cycle: u64,
    pub attributes: BTreeMap<String, String>,
}

impl HookContext {
    pub fn new(point: ExtensionPoint, cycle: u64) -> Self {
        Self {
            point,
            cycle,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Same context, re-pointed at another extension point.
    pub fn at(&self, point: ExtensionPoint) -> Self {
        Self {
            point,
            cycle: self.cycle,
            attributes: self.attributes.clone(),
        }
    }
}
