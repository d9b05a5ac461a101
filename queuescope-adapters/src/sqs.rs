//! SQS transformer.
//!
//! SQS has no brokers or clusters of its own, so the AWS region stands in
//! for the cluster identity. Queue name and region are recovered from the
//! queue URL (`https://sqs.<region>.amazonaws.com/<account>/<name>`) when the
//! sample does not carry them directly.

use queuescope_types::{CanonicalMetricRecord, EntityType, Identity, ProviderKind, RawSample};

use crate::fields::{derive_sum, FieldMapping, SampleReader};
use crate::TransformError;

const DISCRIMINATORS: &[&str] = &["SqsQueueSample", "SQSQueueSample", "AwsSqsQueueSample"];

const REGION: &[&str] = &["awsRegion", "region", "provider.awsRegion"];
const QUEUE: &[&str] = &["queueName", "QueueName", "provider.queueName"];
const QUEUE_URL: &str = "queueUrl";

const QUEUE_METRICS: &[FieldMapping] = &[
    FieldMapping::core(
        "messagesReady",
        &[
            "messagesReady",
            "approximateNumberOfMessagesVisible",
            "ApproximateNumberOfMessagesVisible",
            "provider.approximateNumberOfMessagesVisible.Average",
        ],
    ),
    FieldMapping::core(
        "messagesUnacknowledged",
        &[
            "messagesUnacknowledged",
            "approximateNumberOfMessagesNotVisible",
            "ApproximateNumberOfMessagesNotVisible",
            "provider.approximateNumberOfMessagesNotVisible.Average",
        ],
    ),
    FieldMapping::optional(
        "messagesDelayed",
        &["messagesDelayed", "approximateNumberOfMessagesDelayed"],
    ),
    FieldMapping::optional(
        "messagesPublishedRate",
        &["messagesPublishedRate", "numberOfMessagesSent", "provider.numberOfMessagesSent.Sum"],
    ),
    FieldMapping::optional(
        "messagesDeliveredRate",
        &[
            "messagesDeliveredRate",
            "numberOfMessagesReceived",
            "provider.numberOfMessagesReceived.Sum",
        ],
    ),
    FieldMapping::optional(
        "oldestMessageAgeSeconds",
        &["oldestMessageAgeSeconds", "approximateAgeOfOldestMessage"],
    ),
];

/// Transform an SQS queue sample.
pub(crate) fn transform(sample: &RawSample) -> Result<Option<CanonicalMetricRecord>, TransformError> {
    if !DISCRIMINATORS.contains(&sample.kind.as_str()) {
        return Err(TransformError::invalid(&sample.kind, "unrecognized SQS sample type"));
    }

    let mut reader = SampleReader::new(sample);
    let url = reader.peek_text(QUEUE_URL);

    let region = reader
        .identity(REGION)
        .or_else(|| url.and_then(region_from_url).map(str::to_string))
        .unwrap_or_default();
    let queue = reader
        .identity(QUEUE)
        .or_else(|| url.and_then(name_from_url).map(str::to_string))
        .ok_or_else(|| TransformError::invalid(&sample.kind, "missing queue name and queue URL"))?;

    let identity = Identity::cluster(region).with_queue(queue);
    let mut record = CanonicalMetricRecord::new(EntityType::Queue, ProviderKind::Sqs, identity);
    reader.apply(QUEUE_METRICS, &mut record);
    reader.pass_through(&mut record);

    derive_sum(
        &mut record,
        "messagesTotal",
        "messagesReady",
        "messagesUnacknowledged",
    );

    Ok(Some(record))
}

/// Host part of a queue URL, scheme optional.
pub(crate) fn url_host(url: &str) -> Option<&str> {
    let host = url.split("://").nth(1).unwrap_or(url).split('/').next()?;
    (!host.is_empty()).then_some(host)
}

/// `sqs.<region>.amazonaws.com` host fragment.
fn region_from_url(url: &str) -> Option<&str> {
    let host = url_host(url)?;
    let rest = host.strip_prefix("sqs.")?;
    let region = rest.split('.').next()?;
    (!region.is_empty() && region != "amazonaws").then_some(region)
}

/// Last non-empty path segment.
fn name_from_url(url: &str) -> Option<&str> {
    let path = url.split("://").nth(1).unwrap_or(url);
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.next()?;
    segments.last()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://sqs.us-east-1.amazonaws.com/123456789012/orders";

    #[test]
    fn name_and_region_come_from_url() {
        let sample = RawSample::builder("SqsQueueSample")
            .field("queueUrl", URL)
            .field("approximateNumberOfMessagesVisible", 40.0)
            .field("approximateNumberOfMessagesNotVisible", 2.0)
            .build();
        let record = transform(&sample).unwrap().unwrap();

        assert_eq!(record.identity, Identity::cluster("us-east-1").with_queue("orders"));
        assert_eq!(record.metric("messagesReady"), Some(40.0));
        assert_eq!(record.metric("messagesTotal"), Some(42.0));
        assert_eq!(record.attributes.get("queueUrl").map(String::as_str), Some(URL));
    }

    #[test]
    fn explicit_fields_win_over_url() {
        let sample = RawSample::builder("SqsQueueSample")
            .field("queueName", "payments")
            .field("awsRegion", "eu-west-1")
            .field("queueUrl", URL)
            .build();
        let record = transform(&sample).unwrap().unwrap();
        assert_eq!(record.identity, Identity::cluster("eu-west-1").with_queue("payments"));
    }

    #[test]
    fn missing_region_defaults() {
        let sample = RawSample::builder("SqsQueueSample").field("queueName", "jobs").build();
        let record = transform(&sample).unwrap().unwrap();
        assert_eq!(record.identity.cluster_name, "default");
    }

    #[test]
    fn missing_name_is_invalid() {
        let sample = RawSample::builder("SqsQueueSample").field("messagesReady", 1.0).build();
        assert!(matches!(transform(&sample), Err(TransformError::InvalidSample { .. })));
    }

    #[test]
    fn url_helpers() {
        assert_eq!(region_from_url(URL), Some("us-east-1"));
        assert_eq!(name_from_url(URL), Some("orders"));
        assert_eq!(region_from_url("https://queue.amazonaws.com/1/q"), None);
        assert_eq!(name_from_url("https://sqs.us-east-1.amazonaws.com/"), None);
    }
}
