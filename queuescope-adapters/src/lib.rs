//! # queuescope-adapters
//!
//! Provider transformers for message queue telemetry.
//!
//! Monitoring agents report the same concepts under different names per
//! provider and per agent version. This crate resolves which provider a raw
//! sample came from and maps it onto the canonical record schema from
//! `queuescope-types`.
//!
//! ## Supported Systems
//!
//! - **Kafka** - brokers, topics, consumer groups and clusters, including AWS MSK samples
//! - **RabbitMQ** - queues, nodes and clusters, in agent or Management API spellings
//! - **SQS** - queues, with the AWS region as the cluster identity
//!
//! ## Quick Start
//!
//! ```rust
//! use queuescope_adapters::SampleTransformer;
//! use queuescope_types::RawSample;
//!
//! let transformer = SampleTransformer::builder()
//!     .include_internal_resources(false)
//!     .build();
//!
//! let samples = vec![
//!     RawSample::builder("RabbitmqQueueSample")
//!         .field("clusterName", "rabbit-prod")
//!         .field("queueName", "orders")
//!         .field("messagesReady", 100.0)
//!         .build(),
//!     RawSample::new("UnknownSample"),
//! ];
//!
//! let batch = transformer.transform_batch(&samples);
//! assert_eq!(batch.records.len(), 1);
//! assert_eq!(batch.failures.len(), 1);
//! ```

pub mod detect;
pub mod error;
pub mod fields;
pub mod transformer;

mod kafka;
mod rabbitmq;
mod sqs;

pub use detect::{detect_provider, resolve_provider};
pub use error::TransformError;
pub use fields::FieldMapping;
pub use transformer::{BatchTransform, SampleFailure, SampleTransformer, SampleTransformerBuilder};

// Re-export types for convenience
pub use queuescope_types::{CanonicalMetricRecord, ProviderKind, RawSample};
