//! # queuescope-engine
//!
//! Aggregation, entity synthesis and the hook pipeline for message queue
//! telemetry.
//!
//! Raw samples from Kafka, RabbitMQ and SQS monitoring agents are turned into
//! canonical records by `queuescope-adapters`; this crate groups and reduces
//! them, builds entities with stable GUIDs, health scores and relationships,
//! and runs the whole thing as a cycle with hooks at every stage.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use queuescope_engine::{ExtensionPoint, HookOptions, Pipeline, PipelineConfig, PipelineData};
//! use queuescope_types::RawSample;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(PipelineConfig::load(None)?);
//!
//!     // Observe every entity batch before relationships are built
//!     pipeline.hooks().register(
//!         ExtensionPoint::PostEntityCreate,
//!         |data: PipelineData, _ctx| async move {
//!             println!("{} entities", data.len());
//!             Ok(None)
//!         },
//!         HookOptions::default().name("count"),
//!     )?;
//!
//!     let sample = RawSample::builder("KafkaBrokerSample")
//!         .field("clusterName", "prod")
//!         .field("brokerId", 1)
//!         .field("bytesInPerSecond", 1024000.0)
//!         .build();
//!
//!     let output = pipeline.run_cycle(vec![sample]).await?;
//!     for entity in &output.entities {
//!         println!("{} {:?}", entity.guid, entity.health_score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Rule-driven aggregation**: metric names select sum, max, avg or latest
//! - **Cluster derivation**: clusters are rolled up from their brokers
//! - **Hooks**: async handlers at every stage, with priorities and timeouts
//! - **Middleware**: wrap the transform stage with a `next` continuation
//! - **Deterministic output**: entities and edges are sorted by GUID

pub mod aggregator;
pub mod category;
pub mod config;
pub mod error;
pub mod health;
pub mod hooks;
pub mod middleware;
pub mod payload;
pub mod pipeline;
pub mod rules;
pub mod synthesizer;

pub use aggregator::Aggregator;
pub use category::{categorize, CategoryRollup, MetricCategory, RedSummary, UseSummary};
pub use config::PipelineConfig;
pub use error::{AggregationError, BoxError, EngineError, HookError};
pub use health::{health_score, health_status};
pub use hooks::{
    ExtensionPoint, HookEvent, HookFailure, HookOptions, HookRegistry, HookRegistryBuilder, HookResult,
    HookRun, Registration,
};
pub use middleware::{MiddlewareChain, MiddlewareOptions, Next};
pub use payload::{FailureNotice, HookContext, PipelineData};
pub use pipeline::{CycleOutput, CycleReport, Pipeline};
pub use rules::{rule_for, AggregationRule, AGGREGATION_RULES};
pub use synthesizer::{golden_metric_names, Synthesis, Synthesizer};
