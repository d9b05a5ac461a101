//! Provider resolution.
//!
//! An explicit provider tag on the sample always wins. Otherwise, when
//! auto-detection is enabled, fingerprints are checked in a fixed order and
//! the first match decides. The order matters: a sample carrying both a
//! `kafkaVersion` field and a `Rabbitmq*` discriminator resolves to Kafka.

use queuescope_types::{ProviderKind, RawSample, SampleValue};

use crate::sqs::url_host;
use crate::TransformError;

/// A single provider fingerprint.
#[derive(Debug, Clone, Copy)]
enum Fingerprint {
    /// The field is present and non-null.
    Field(&'static str),
    /// The field is a URL whose host has the label, e.g. `sqs` in
    /// `sqs.us-east-1.amazonaws.com`.
    HostLabel(&'static str, &'static str),
    /// The discriminator starts with the prefix.
    KindPrefix(&'static str),
}

impl Fingerprint {
    fn matches(&self, sample: &RawSample) -> bool {
        match *self {
            Fingerprint::Field(key) => sample.contains(key),
            Fingerprint::HostLabel(key, label) => match sample.get(key) {
                Some(SampleValue::Text(url)) => url_host(url)
                    .is_some_and(|host| host.split('.').any(|l| l.eq_ignore_ascii_case(label))),
                _ => false,
            },
            Fingerprint::KindPrefix(prefix) => sample.kind.starts_with(prefix),
        }
    }
}

/// Fingerprints in priority order.
const FINGERPRINTS: &[(Fingerprint, ProviderKind)] = &[
    (Fingerprint::Field("kafkaVersion"), ProviderKind::Kafka),
    (Fingerprint::Field("controllerId"), ProviderKind::Kafka),
    (Fingerprint::Field("rabbitVersion"), ProviderKind::RabbitMq),
    (Fingerprint::Field("erlangVersion"), ProviderKind::RabbitMq),
    (Fingerprint::HostLabel("queueUrl", "sqs"), ProviderKind::Sqs),
    (Fingerprint::KindPrefix("Kafka"), ProviderKind::Kafka),
    (Fingerprint::KindPrefix("AwsMsk"), ProviderKind::Kafka),
    (Fingerprint::KindPrefix("Rabbitmq"), ProviderKind::RabbitMq),
    (Fingerprint::KindPrefix("RabbitMQ"), ProviderKind::RabbitMq),
    (Fingerprint::KindPrefix("Sqs"), ProviderKind::Sqs),
    (Fingerprint::KindPrefix("SQS"), ProviderKind::Sqs),
];

/// Fingerprint a sample without looking at its provider tag.
pub fn detect_provider(sample: &RawSample) -> Option<ProviderKind> {
    FINGERPRINTS
        .iter()
        .find(|(fingerprint, _)| fingerprint.matches(sample))
        .map(|(_, provider)| *provider)
}

/// Decide which provider transformer handles a sample.
pub fn resolve_provider(sample: &RawSample, auto_detect: bool) -> Result<ProviderKind, TransformError> {
    if let Some(tag) = sample.provider.as_deref().filter(|t| !t.trim().is_empty()) {
        return tag
            .parse()
            .map_err(|e| TransformError::unknown_provider(&sample.kind, format!("{e}")));
    }

    if !auto_detect {
        return Err(TransformError::unknown_provider(
            &sample.kind,
            "no provider tag and auto-detection is disabled",
        ));
    }

    detect_provider(sample).ok_or_else(|| {
        TransformError::unknown_provider(&sample.kind, "no provider fingerprint matched")
    })
}
