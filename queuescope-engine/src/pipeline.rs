//! The pipeline driver.
//!
//! One call to [`Pipeline::run_cycle`] takes a batch of raw samples through
//! every stage, running the hooks registered at each stage boundary:
//!
//! ```text
//! samples ─► middleware ─► transform ─► validate ─► aggregate ─► entity-create
//!        ─► enrich ─► optimize ─► relationship-create ─► window-rotate
//! ```
//!
//! Per-item failures are counted, logged and handed to the matching error
//! extension point; they never abort the cycle. Only configuration errors
//! and hook failures under `stop_on_error` do.

use std::collections::BTreeMap;

use queuescope_adapters::SampleTransformer;
use queuescope_types::{CanonicalMetricRecord, Entity, RawSample, Relationship};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::category::CategoryRollup;
use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::health::health_status;
use crate::hooks::{ExtensionPoint, HookRegistry};
use crate::middleware::MiddlewareChain;
use crate::payload::{FailureNotice, HookContext, PipelineData};
use crate::rules::rule_for;
use crate::synthesizer::{attach_relationships, Synthesizer};

/// Value of the `instrumentation.source` tag added during enrichment.
pub const INSTRUMENTATION_SOURCE: &str = "queuescope";

/// What a cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub samples_received: usize,
    pub samples_transformed: usize,
    /// Internal resources skipped by the transformers.
    pub samples_filtered: usize,
    pub transformation_errors: usize,
    /// Metric values dropped by validation.
    pub validation_errors: usize,
    pub hook_failures: usize,
    pub entities_created: usize,
    pub relationships_created: usize,
}

/// Output of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutput {
    /// Sorted by GUID.
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub report: CycleReport,
}

/// Drives samples through transformation, aggregation and synthesis.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    transformer: SampleTransformer,
    aggregator: Aggregator,
    synthesizer: Synthesizer,
    hooks: HookRegistry,
    middleware: MiddlewareChain,
    /// Last cycle number. Held for the whole cycle so cycles never overlap.
    cycle: Mutex<u64>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let transformer = SampleTransformer::builder()
            .auto_detect_provider(config.auto_detect_provider)
            .include_internal_resources(config.include_internal_resources)
            .build();
        let synthesizer = Synthesizer::new(config.account_id.clone())
            .generate_relationships(config.generate_relationships);
        let hooks = HookRegistry::builder()
            .max_hooks_per_point(config.max_hooks_per_extension_point)
            .default_timeout(config.hook_timeout())
            .stop_on_error(config.stop_on_error)
            .build();
        let middleware = MiddlewareChain::new(config.max_hooks_per_extension_point);

        Self {
            config,
            transformer,
            aggregator: Aggregator::new(),
            synthesizer,
            hooks,
            middleware,
            cycle: Mutex::new(0),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// Run one batch through every stage.
    pub async fn run_cycle(&self, samples: Vec<RawSample>) -> Result<CycleOutput, EngineError> {
        let mut guard = self.cycle.lock().await;
        *guard += 1;
        let cycle = *guard;

        let mut cx = Cycle {
            pipeline: self,
            ctx: HookContext::new(ExtensionPoint::PreTransform, cycle),
            report: CycleReport {
                cycle,
                samples_received: samples.len(),
                ..CycleReport::default()
            },
        };

        // Transform
        let samples = cx.stage(ExtensionPoint::PreTransform, samples).await?;
        let samples: Vec<RawSample> = self
            .middleware
            .execute(samples.into(), cx.ctx.at(ExtensionPoint::PreTransform))
            .await
            .and_then(|data| expect(ExtensionPoint::PreTransform, "samples", data))?;
        let records = cx.transform(&samples).await?;
        let records = cx.stage(ExtensionPoint::PostTransform, records).await?;

        // Validate
        let records = cx.stage(ExtensionPoint::PreValidate, records).await?;
        let records = cx.validate(records).await?;
        let records = cx.stage(ExtensionPoint::PostValidate, records).await?;

        // Aggregate
        let records = cx.stage(ExtensionPoint::PreAggregate, records).await?;
        let aggregated = self.aggregator.aggregate(&records)?;
        debug!(cycle, groups = aggregated.len(), "aggregated");
        let aggregated = cx.stage(ExtensionPoint::PostAggregate, aggregated).await?;

        // Synthesize
        let aggregated = cx.stage(ExtensionPoint::PreEntityCreate, aggregated).await?;
        let entities = self.synthesizer.entities(&aggregated)?;
        let mut entities = cx.stage(ExtensionPoint::PostEntityCreate, entities).await?;

        if self.config.enrich_with_metadata {
            let mut enriched = cx.stage(ExtensionPoint::PreEnrich, entities).await?;
            enrich(&mut enriched);
            entities = cx.stage(ExtensionPoint::PostEnrich, enriched).await?;
        }

        let entities = cx.stage(ExtensionPoint::PreOptimize, entities).await?;
        let entities = optimize(entities);
        let mut entities = cx.stage(ExtensionPoint::PostOptimize, entities).await?;

        let mut relationships = Vec::new();
        if self.config.generate_relationships {
            entities = cx.stage(ExtensionPoint::PreRelationshipCreate, entities).await?;
            let edges = self.synthesizer.relationships(&entities);
            relationships = cx.stage(ExtensionPoint::PostRelationshipCreate, edges).await?;
            attach_relationships(&mut entities, &relationships);
        }

        cx.report.entities_created = entities.len();
        cx.report.relationships_created = relationships.len();

        // Close the cycle. Failures at these points are added to whatever
        // report the hooks hand back.
        let report = cx.report.clone();
        let before = cx.report.hook_failures;
        let report = cx.stage(ExtensionPoint::PreWindowRotate, report).await?;
        let mut report = cx.stage(ExtensionPoint::PostWindowRotate, report).await?;
        report.hook_failures += cx.report.hook_failures - before;

        info!(
            cycle,
            received = report.samples_received,
            transformed = report.samples_transformed,
            filtered = report.samples_filtered,
            transformation_errors = report.transformation_errors,
            validation_errors = report.validation_errors,
            hook_failures = report.hook_failures,
            entities = report.entities_created,
            relationships = report.relationships_created,
            "cycle complete"
        );

        Ok(CycleOutput {
            entities,
            relationships,
            report,
        })
    }
}

/// State for one cycle in flight.
struct Cycle<'a> {
    pipeline: &'a Pipeline,
    ctx: HookContext,
    report: CycleReport,
}

impl Cycle<'_> {
    /// Run the hooks at `point` over a typed payload.
    async fn stage<T>(&mut self, point: ExtensionPoint, data: T) -> Result<T, EngineError>
    where
        T: Into<PipelineData> + TryFrom<PipelineData, Error = PipelineData>,
    {
        let data: PipelineData = data.into();
        let expected = data.kind();
        let run = self
            .pipeline
            .hooks
            .execute_hooks(point, data, self.ctx.at(point))
            .await?;
        self.report.hook_failures += run.failures.len();
        expect(point, expected, run.data)
    }

    /// Hand a failure to the hooks at an error extension point.
    async fn notify(&mut self, point: ExtensionPoint, notice: FailureNotice) -> Result<(), EngineError> {
        let run = self
            .pipeline
            .hooks
            .execute_hooks(point, PipelineData::Failure(notice), self.ctx.at(point))
            .await?;
        self.report.hook_failures += run.failures.len();
        Ok(())
    }

    async fn transform(&mut self, samples: &[RawSample]) -> Result<Vec<CanonicalMetricRecord>, EngineError> {
        let batch = self.pipeline.transformer.transform_batch(samples);

        self.report.samples_transformed = batch.records.len();
        self.report.samples_filtered = batch.filtered;
        self.report.transformation_errors = batch.failures.len();

        for failure in &batch.failures {
            let kind = failure.error.kind().to_string();
            let notice = FailureNotice::new(
                ExtensionPoint::TransformationError,
                kind,
                failure.error.to_string(),
            )
            .at(failure.index);
            self.notify(ExtensionPoint::TransformationError, notice).await?;
        }

        debug!(
            cycle = self.report.cycle,
            records = batch.records.len(),
            failures = batch.failures.len(),
            filtered = batch.filtered,
            "transformed samples"
        );
        Ok(batch.records)
    }

    /// Drop metric values the aggregator cannot use: non-finite numbers, and
    /// non-numeric values under a reducing rule.
    async fn validate(
        &mut self,
        mut records: Vec<CanonicalMetricRecord>,
    ) -> Result<Vec<CanonicalMetricRecord>, EngineError> {
        let mut rejected = Vec::new();

        for (index, record) in records.iter_mut().enumerate() {
            let entity = record.identity.display_name(record.entity_type);
            record.metrics.retain(|name, value| {
                let rule = rule_for(name);
                let reason = if !value.is_finite() {
                    "non-finite value"
                } else if rule.is_numeric() && value.as_f64().is_none() {
                    "non-numeric value"
                } else {
                    return true;
                };
                warn!(%entity, metric = %name, ?value, reason, "dropping metric");
                rejected.push(
                    FailureNotice::new(
                        ExtensionPoint::ValidationError,
                        name.clone(),
                        format!("{reason} for {entity} under the {} rule", rule.as_str()),
                    )
                    .at(index),
                );
                false
            });
        }

        self.report.validation_errors = rejected.len();
        for notice in rejected {
            self.notify(ExtensionPoint::ValidationError, notice).await?;
        }
        Ok(records)
    }
}

/// Convert a stage payload back to its typed form.
fn expect<T>(point: ExtensionPoint, expected: &'static str, data: PipelineData) -> Result<T, EngineError>
where
    T: TryFrom<PipelineData, Error = PipelineData>,
{
    T::try_from(data).map_err(|other| EngineError::PayloadMismatch {
        point: point.to_string(),
        expected,
        actual: other.kind(),
    })
}

/// Add metadata tags: source, health status and per-category metric counts.
/// Nothing cycle-specific, so repeated cycles stay identical.
fn enrich(entities: &mut [Entity]) {
    for entity in entities.iter_mut() {
        let tags = &mut entity.tags;
        tags.insert("instrumentation.source".into(), INSTRUMENTATION_SOURCE.into());
        if let Some(score) = entity.health_score {
            tags.insert("healthStatus".into(), health_status(score).into());
        }

        let rollup = CategoryRollup::from_metrics(&entity.metrics);
        for (category, metrics) in &rollup.categories {
            tags.insert(format!("category.{}", category.as_str()), metrics.len().to_string());
        }
    }
}

/// Collapse duplicate GUIDs, last one wins, and sort.
fn optimize(entities: Vec<Entity>) -> Vec<Entity> {
    let before = entities.len();
    let by_guid: BTreeMap<_, _> = entities.into_iter().map(|e| (e.guid.clone(), e)).collect();
    if by_guid.len() != before {
        debug!(before, after = by_guid.len(), "collapsed duplicate entities");
    }
    by_guid.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::hooks::HookOptions;
    use crate::middleware::{MiddlewareOptions, Next};
    use parking_lot::Mutex as SyncMutex;
    use queuescope_types::{EntityType, RelationshipType};
    use std::sync::Arc;

    fn broker(id: i64, under_replicated: f64, bytes_in: f64) -> RawSample {
        RawSample::builder("KafkaBrokerSample")
            .field("clusterName", "prod")
            .field("broker.id", id)
            .field("broker.bytesInPerSecond", bytes_in)
            .field("replication.unreplicatedPartitions", under_replicated)
            .build()
    }

    fn topic(name: &str) -> RawSample {
        RawSample::builder("KafkaTopicSample")
            .field("clusterName", "prod")
            .field("topic", name)
            .field("topic.bytesInPerSecond", 10.0)
            .build()
    }

    fn quiet() -> PipelineConfig {
        PipelineConfig {
            enrich_with_metadata: false,
            ..PipelineConfig::default()
        }
    }

    fn find(output: &CycleOutput, entity_type: EntityType) -> Vec<&Entity> {
        output
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    #[tokio::test]
    async fn brokers_become_entities_with_a_derived_cluster() {
        let pipeline = Pipeline::default();
        let output = pipeline
            .run_cycle(vec![broker(1, 5.0, 100.0), broker(2, 3.0, 200.0), broker(3, 8.0, 300.0)])
            .await
            .unwrap();

        assert_eq!(find(&output, EntityType::Broker).len(), 3);
        let clusters = find(&output, EntityType::Cluster);
        assert_eq!(clusters.len(), 1);
        let cluster = clusters[0];
        assert_eq!(cluster.guid.as_str(), "MESSAGE_QUEUE_CLUSTER|0|kafka|prod");
        assert_eq!(cluster.metric("underReplicatedPartitions"), Some(8.0));
        assert_eq!(cluster.metric("bytesInPerSecond"), Some(600.0));
        assert_eq!(cluster.health_score, Some(80.0));
        assert_eq!(cluster.tag("healthStatus"), Some("healthy"));
        assert_eq!(cluster.tag("instrumentation.source"), Some("queuescope"));
        assert!(cluster.tag("cycle").is_none());

        // CONTAINS and BELONGS_TO per broker
        assert_eq!(output.relationships.len(), 6);
        assert_eq!(
            cluster
                .relationships
                .iter()
                .filter(|r| r.kind == RelationshipType::Contains)
                .count(),
            3
        );

        let report = &output.report;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.samples_received, 3);
        assert_eq!(report.samples_transformed, 3);
        assert_eq!(report.entities_created, 4);
        assert_eq!(report.relationships_created, 6);
    }

    #[tokio::test]
    async fn single_broker_and_missing_cluster_name() {
        let pipeline = Pipeline::new(PipelineConfig {
            account_id: "12345".into(),
            ..quiet()
        });
        let prod = RawSample::builder("KafkaBrokerSample")
            .field("brokerId", 1_i64)
            .field("bytesInPerSecond", 1_024_000.0)
            .field("underReplicatedPartitions", 0.0)
            .field("clusterName", "prod")
            .build();
        let nameless = RawSample::builder("KafkaBrokerSample")
            .field("brokerId", 7_i64)
            .build();

        let output = pipeline.run_cycle(vec![prod, nameless]).await.unwrap();
        let guids: Vec<&str> = output.entities.iter().map(|e| e.guid.as_str()).collect();

        assert_eq!(
            guids,
            vec![
                "MESSAGE_QUEUE_BROKER|12345|kafka|default|7",
                "MESSAGE_QUEUE_BROKER|12345|kafka|prod|1",
                "MESSAGE_QUEUE_CLUSTER|12345|kafka|default",
                "MESSAGE_QUEUE_CLUSTER|12345|kafka|prod",
            ]
        );
        let prod_cluster = &output.entities[3];
        assert_eq!(prod_cluster.metric("brokerCount"), Some(1.0));
        assert_eq!(prod_cluster.health_score, Some(100.0));
        assert_eq!(output.report.transformation_errors, 0);
    }

    #[tokio::test]
    async fn internal_topics_are_filtered() {
        let pipeline = Pipeline::new(quiet());
        let output = pipeline
            .run_cycle(vec![topic("orders"), topic("__consumer_offsets")])
            .await
            .unwrap();

        assert_eq!(output.entities.len(), 1);
        assert_eq!(output.entities[0].name, "prod:orders");
        assert_eq!(output.report.samples_filtered, 1);
    }

    #[tokio::test]
    async fn transformation_failures_reach_hooks_and_do_not_abort() {
        let pipeline = Pipeline::new(quiet());
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let sink = seen.clone();
        pipeline
            .hooks()
            .register(
                ExtensionPoint::TransformationError,
                move |data, _ctx| {
                    let sink = sink.clone();
                    async move {
                        if let PipelineData::Failure(notice) = data {
                            sink.lock().push((notice.index, notice.source));
                        }
                        Ok(None)
                    }
                },
                HookOptions::default(),
            )
            .unwrap();

        let broken = RawSample::builder("KafkaBrokerSample")
            .field("clusterName", "prod")
            .build();
        let output = pipeline
            .run_cycle(vec![broker(1, 0.0, 1.0), broken, RawSample::new("MysterySample")])
            .await
            .unwrap();

        assert_eq!(output.report.transformation_errors, 2);
        assert_eq!(output.report.samples_transformed, 1);
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, Some(1));
        assert_eq!(seen[1].0, Some(2));
        assert!(!output.entities.is_empty());
    }

    #[tokio::test]
    async fn validation_drops_non_finite_values() {
        let pipeline = Pipeline::new(quiet());
        let dropped = Arc::new(SyncMutex::new(Vec::new()));
        let sink = dropped.clone();
        pipeline
            .hooks()
            .register(
                ExtensionPoint::ValidationError,
                move |data, _ctx| {
                    let sink = sink.clone();
                    async move {
                        if let PipelineData::Failure(notice) = data {
                            sink.lock().push(notice.source);
                        }
                        Ok(None)
                    }
                },
                HookOptions::default(),
            )
            .unwrap();

        let output = pipeline
            .run_cycle(vec![broker(1, 0.0, f64::NAN)])
            .await
            .unwrap();

        // The derived total inherits the NaN
        assert_eq!(output.report.validation_errors, 2);
        assert_eq!(
            *dropped.lock(),
            vec!["bytesInPerSecond".to_string(), "bytesTotalPerSecond".to_string()]
        );
        let broker = find(&output, EntityType::Broker)[0];
        assert!(broker.metric("bytesInPerSecond").is_none());
        assert_eq!(broker.metric("bytesOutPerSecond"), Some(0.0));
    }

    #[tokio::test]
    async fn hooks_fire_in_stage_order() {
        let pipeline = Pipeline::default();
        let visited = Arc::new(SyncMutex::new(Vec::new()));

        for point in ExtensionPoint::ALL {
            let visited = visited.clone();
            pipeline
                .hooks()
                .register(
                    point,
                    move |_data, ctx: HookContext| {
                        let visited = visited.clone();
                        async move {
                            visited.lock().push(ctx.point);
                            Ok(None)
                        }
                    },
                    HookOptions::default(),
                )
                .unwrap();
        }

        pipeline.run_cycle(vec![broker(1, 0.0, 1.0)]).await.unwrap();

        use ExtensionPoint::*;
        assert_eq!(
            *visited.lock(),
            vec![
                PreTransform,
                PostTransform,
                PreValidate,
                PostValidate,
                PreAggregate,
                PostAggregate,
                PreEntityCreate,
                PostEntityCreate,
                PreEnrich,
                PostEnrich,
                PreOptimize,
                PostOptimize,
                PreRelationshipCreate,
                PostRelationshipCreate,
                PreWindowRotate,
                PostWindowRotate,
            ]
        );
    }

    #[tokio::test]
    async fn hooks_can_rewrite_entities() {
        let pipeline = Pipeline::new(quiet());
        pipeline
            .hooks()
            .register(
                ExtensionPoint::PostEntityCreate,
                |data, _ctx| async move {
                    let result: Result<Option<PipelineData>, BoxError> = match data {
                        PipelineData::Entities(mut entities) => {
                            for entity in &mut entities {
                                entity.tags.insert("team".into(), "payments".into());
                            }
                            Ok(Some(PipelineData::Entities(entities)))
                        }
                        other => Ok(Some(other)),
                    };
                    result
                },
                HookOptions::default(),
            )
            .unwrap();

        let output = pipeline.run_cycle(vec![broker(1, 0.0, 1.0)]).await.unwrap();
        assert!(output.entities.iter().all(|e| e.tag("team") == Some("payments")));
    }

    #[tokio::test]
    async fn failing_hooks_are_counted_and_skipped() {
        let pipeline = Pipeline::new(quiet());
        pipeline
            .hooks()
            .register(
                ExtensionPoint::PostAggregate,
                |_data, _ctx| async { Err::<Option<PipelineData>, BoxError>("broken".into()) },
                HookOptions::default(),
            )
            .unwrap();

        let output = pipeline.run_cycle(vec![broker(1, 0.0, 1.0)]).await.unwrap();
        assert_eq!(output.report.hook_failures, 1);
        assert_eq!(output.entities.len(), 2);
    }

    #[tokio::test]
    async fn stop_on_error_aborts_the_cycle() {
        let pipeline = Pipeline::new(PipelineConfig {
            stop_on_error: true,
            ..PipelineConfig::default()
        });
        pipeline
            .hooks()
            .register(
                ExtensionPoint::PreAggregate,
                |_data, _ctx| async { Err::<Option<PipelineData>, BoxError>("broken".into()) },
                HookOptions::default(),
            )
            .unwrap();

        let err = pipeline.run_cycle(vec![broker(1, 0.0, 1.0)]).await.unwrap_err();
        assert!(matches!(err, EngineError::HookAborted { .. }));
    }

    #[tokio::test]
    async fn middleware_sees_samples_before_transformation() {
        let pipeline = Pipeline::new(quiet());
        pipeline
            .middleware()
            .use_middleware(
                |data: PipelineData, ctx: HookContext, next: Next| async move {
                    let data = match data {
                        PipelineData::Samples(samples) => PipelineData::Samples(
                            samples.into_iter().filter(|s| s.kind != "KafkaTopicSample").collect(),
                        ),
                        other => other,
                    };
                    next.run(data, ctx).await
                },
                MiddlewareOptions::default().name("drop-topics"),
            )
            .unwrap();

        let output = pipeline
            .run_cycle(vec![broker(1, 0.0, 1.0), topic("orders")])
            .await
            .unwrap();
        assert!(find(&output, EntityType::Topic).is_empty());
        assert_eq!(output.report.samples_received, 2);
        assert_eq!(output.report.samples_transformed, 1);
    }

    #[tokio::test]
    async fn relationship_hooks_shape_entity_edges() {
        let pipeline = Pipeline::new(quiet());
        pipeline
            .hooks()
            .register(
                ExtensionPoint::PostRelationshipCreate,
                |data, _ctx| async move {
                    let result: Result<Option<PipelineData>, BoxError> = match data {
                        PipelineData::Relationships(edges) => Ok(Some(PipelineData::Relationships(
                            edges
                                .into_iter()
                                .filter(|r| r.kind == RelationshipType::Contains)
                                .collect(),
                        ))),
                        other => Ok(Some(other)),
                    };
                    result
                },
                HookOptions::default(),
            )
            .unwrap();

        let output = pipeline.run_cycle(vec![broker(1, 0.0, 1.0)]).await.unwrap();
        assert_eq!(output.relationships.len(), 1);
        let broker = find(&output, EntityType::Broker)[0];
        assert!(broker.relationships.is_empty());
    }

    #[tokio::test]
    async fn relationships_can_be_disabled() {
        let pipeline = Pipeline::new(PipelineConfig {
            generate_relationships: false,
            ..quiet()
        });
        let output = pipeline.run_cycle(vec![broker(1, 0.0, 1.0)]).await.unwrap();

        assert!(output.relationships.is_empty());
        assert!(output.entities.iter().all(|e| e.relationships.is_empty()));
    }

    #[tokio::test]
    async fn repeated_cycles_are_identical() {
        let pipeline = Pipeline::default();
        let batch = vec![broker(2, 1.0, 5.0), topic("orders"), broker(1, 0.0, 7.0)];

        let first = pipeline.run_cycle(batch.clone()).await.unwrap();
        let second = pipeline.run_cycle(batch).await.unwrap();

        assert_eq!(first.entities, second.entities);
        assert_eq!(first.relationships, second.relationships);
        assert_eq!(second.report.cycle, 2);
        assert_eq!(
            serde_json::to_string(&first.entities).unwrap(),
            serde_json::to_string(&second.entities).unwrap()
        );
    }

    #[tokio::test]
    async fn window_rotate_hooks_see_the_report() {
        let pipeline = Pipeline::new(quiet());
        let reports = Arc::new(SyncMutex::new(Vec::new()));
        let sink = reports.clone();
        pipeline
            .hooks()
            .register(
                ExtensionPoint::PostWindowRotate,
                move |data, _ctx| {
                    let sink = sink.clone();
                    async move {
                        if let PipelineData::Report(report) = data {
                            sink.lock().push(report);
                        }
                        Ok(None)
                    }
                },
                HookOptions::default(),
            )
            .unwrap();

        let output = pipeline.run_cycle(vec![topic("orders")]).await.unwrap();
        assert_eq!(*reports.lock(), vec![output.report]);
    }

    #[test]
    fn enrichment_counts_metric_categories() {
        let synthesizer = Synthesizer::new("0");
        let record = CanonicalMetricRecord::new(
            EntityType::Broker,
            queuescope_types::ProviderKind::Kafka,
            queuescope_types::Identity::cluster("prod").with_broker("1"),
        )
        .with_metric("bytesInPerSecond", 1.0)
        .with_metric("bytesOutPerSecond", 1.0)
        .with_metric("cpuPercent", 20.0);
        let mut entities = synthesizer
            .entities(&[queuescope_types::AggregatedMetricRecord::single(record)])
            .unwrap();

        enrich(&mut entities);
        let broker = entities
            .iter()
            .find(|e| e.entity_type == EntityType::Broker)
            .unwrap();
        assert_eq!(broker.tag("category.throughput"), Some("2"));
        assert_eq!(broker.tag("category.utilization"), Some("1"));
        assert_eq!(broker.tag("instrumentation.source"), Some("queuescope"));
        assert!(broker.tag("cycle").is_none());
    }
}
