//! # queuescope-types
//!
//! Core types for message queue entity synthesis. This crate defines the
//! provider-agnostic data model that flows through the queuescope pipeline:
//! raw agent samples in, canonical metric records in the middle, entities
//! with stable GUIDs and relationships out.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to read and write JSON
//! - **Provider agnostic**: Kafka, RabbitMQ and SQS samples share one canonical schema
//! - **Stable identity**: GUIDs are a pure function of entity type, account, provider and name
//! - **Ergonomic builders**: Fluent API for constructing samples and records
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde, using the wire names agents emit
//!
//! ## Example
//!
//! ```rust
//! use queuescope_types::{EntityGuid, EntityType, Identity, ProviderKind, RawSample};
//!
//! let sample = RawSample::builder("KafkaBrokerSample")
//!     .field("clusterName", "prod")
//!     .field("brokerId", 1)
//!     .build();
//! assert!(sample.contains("brokerId"));
//!
//! let identity = Identity::cluster("prod").with_broker("1");
//! let guid = EntityGuid::derive(EntityType::Broker, "0", ProviderKind::Kafka, &identity);
//! assert_eq!(guid.as_str(), "MESSAGE_QUEUE_BROKER|0|kafka|prod|1");
//! ```

mod entity;
mod guid;
mod identity;
mod record;
mod sample;

pub use entity::*;
pub use guid::*;
pub use identity::*;
pub use record::*;
pub use sample::*;
