//! The provider transformer front end.

use queuescope_types::{CanonicalMetricRecord, ProviderKind, RawSample};
use tracing::{debug, warn};

use crate::detect::resolve_provider;
use crate::{kafka, rabbitmq, sqs, TransformError};

/// Converts raw samples into canonical metric records.
///
/// # Example
///
/// ```rust
/// use queuescope_adapters::SampleTransformer;
/// use queuescope_types::RawSample;
///
/// let transformer = SampleTransformer::builder().auto_detect_provider(true).build();
///
/// let sample = RawSample::builder("KafkaBrokerSample")
///     .field("clusterName", "prod")
///     .field("brokerId", 1)
///     .field("bytesInPerSecond", 1024000.0)
///     .build();
///
/// let record = transformer.transform(&sample).unwrap().unwrap();
/// assert_eq!(record.metric("bytesInPerSecond"), Some(1024000.0));
/// ```
#[derive(Debug, Clone)]
pub struct SampleTransformer {
    auto_detect_provider: bool,
    include_internal_resources: bool,
}

impl Default for SampleTransformer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SampleTransformer {
    /// Create a new builder for configuring the transformer.
    pub fn builder() -> SampleTransformerBuilder {
        SampleTransformerBuilder::default()
    }

    /// Transform one sample.
    ///
    /// Returns `Ok(None)` when the sample names an internal resource that is
    /// filtered out.
    pub fn transform(&self, sample: &RawSample) -> Result<Option<CanonicalMetricRecord>, TransformError> {
        let provider = resolve_provider(sample, self.auto_detect_provider)?;

        let record = match provider {
            ProviderKind::Kafka => kafka::transform(sample, self.include_internal_resources)?,
            ProviderKind::RabbitMq => rabbitmq::transform(sample, self.include_internal_resources)?,
            ProviderKind::Sqs => sqs::transform(sample)?,
        };

        match &record {
            Some(r) => debug!(
                kind = %sample.kind,
                %provider,
                entity_type = %r.entity_type,
                metrics = r.metrics.len(),
                "transformed sample"
            ),
            None => debug!(kind = %sample.kind, %provider, "filtered internal resource"),
        }

        Ok(record)
    }

    /// Transform a batch. Failures are recorded per sample and never abort
    /// the batch; records keep input order.
    pub fn transform_batch(&self, samples: &[RawSample]) -> BatchTransform {
        let mut batch = BatchTransform::default();

        for (index, sample) in samples.iter().enumerate() {
            match self.transform(sample) {
                Ok(Some(record)) => batch.records.push(record),
                Ok(None) => batch.filtered += 1,
                Err(error) => {
                    warn!(index, kind = %sample.kind, %error, "dropping sample");
                    batch.failures.push(SampleFailure { index, error });
                }
            }
        }

        batch
    }
}

/// Builder for `SampleTransformer`.
#[derive(Debug)]
pub struct SampleTransformerBuilder {
    auto_detect_provider: bool,
    include_internal_resources: bool,
}

impl Default for SampleTransformerBuilder {
    fn default() -> Self {
        Self {
            auto_detect_provider: true,
            include_internal_resources: false,
        }
    }
}

impl SampleTransformerBuilder {
    /// Fingerprint samples that carry no provider tag (default: on).
    pub fn auto_detect_provider(mut self, enabled: bool) -> Self {
        self.auto_detect_provider = enabled;
        self
    }

    /// Keep internal topics, groups and queues (default: off).
    pub fn include_internal_resources(mut self, enabled: bool) -> Self {
        self.include_internal_resources = enabled;
        self
    }

    pub fn build(self) -> SampleTransformer {
        SampleTransformer {
            auto_detect_provider: self.auto_detect_provider,
            include_internal_resources: self.include_internal_resources,
        }
    }
}

/// Outcome of a batch transform.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchTransform {
    pub records: Vec<CanonicalMetricRecord>,
    pub failures: Vec<SampleFailure>,
    /// Samples dropped as internal resources.
    pub filtered: usize,
}

/// A sample that could not be transformed.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFailure {
    /// Position of the sample in the input batch.
    pub index: usize,
    pub error: TransformError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuescope_types::EntityType;

    #[test]
    fn test_builder_defaults() {
        let builder = SampleTransformerBuilder::default();
        assert!(builder.auto_detect_provider);
        assert!(!builder.include_internal_resources);
    }

    #[test]
    fn builder_chains_all_options() {
        let transformer = SampleTransformer::builder()
            .auto_detect_provider(false)
            .include_internal_resources(true)
            .build();
        assert!(!transformer.auto_detect_provider);
        assert!(transformer.include_internal_resources);
    }

    #[test]
    fn dispatches_by_detected_provider() {
        let transformer = SampleTransformer::default();
        let samples = [
            RawSample::builder("KafkaTopicSample").field("topic", "orders").build(),
            RawSample::builder("RabbitmqQueueSample").field("queueName", "jobs").build(),
            RawSample::builder("SqsQueueSample").field("queueName", "mail").build(),
        ];

        let providers: Vec<_> = samples
            .iter()
            .map(|s| transformer.transform(s).unwrap().unwrap().provider)
            .collect();
        assert_eq!(
            providers,
            vec![ProviderKind::Kafka, ProviderKind::RabbitMq, ProviderKind::Sqs]
        );
    }

    #[test]
    fn batch_isolates_failures() {
        let transformer = SampleTransformer::default();
        let samples = vec![
            RawSample::builder("KafkaBrokerSample")
                .field("clusterName", "prod")
                .field("brokerId", 1)
                .build(),
            RawSample::new("HostSample"),
            RawSample::builder("KafkaTopicSample")
                .field("topic", "__consumer_offsets")
                .build(),
            RawSample::builder("KafkaBrokerSample").field("clusterName", "prod").build(),
            RawSample::builder("KafkaBrokerSample")
                .field("clusterName", "prod")
                .field("brokerId", 2)
                .build(),
        ];

        let batch = transformer.transform_batch(&samples);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.filtered, 1);
        assert_eq!(
            batch.failures.iter().map(|f| f.index).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(matches!(
            batch.failures[0].error,
            TransformError::UnknownProvider { .. }
        ));
        assert!(batch.records.iter().all(|r| r.entity_type == EntityType::Broker));
    }

    #[test]
    fn tagged_samples_skip_detection() {
        let transformer = SampleTransformer::builder().auto_detect_provider(false).build();
        let sample = RawSample::builder("SqsQueueSample")
            .provider("sqs")
            .field("queueName", "mail")
            .build();
        assert!(transformer.transform(&sample).unwrap().is_some());

        let untagged = RawSample::builder("SqsQueueSample").field("queueName", "mail").build();
        assert!(transformer.transform(&untagged).is_err());
    }
}
