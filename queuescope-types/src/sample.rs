//! Raw samples as emitted by monitoring agents, and the providers they come from.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single field value inside a raw sample.
///
/// Agents report loosely typed key/value pairs; numbers are widened to `f64`
/// and anything else is kept as text or a flag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SampleValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Numeric view of the value. Numeric strings are parsed, booleans are not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(n) => Some(*n),
            SampleValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// String view of the value. Integral numbers render without a fraction.
    pub fn as_identity(&self) -> Option<String> {
        match self {
            SampleValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            SampleValue::Number(n) if n.is_finite() => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SampleValue::Null)
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Number(v)
    }
}

impl From<i64> for SampleValue {
    fn from(v: i64) -> Self {
        SampleValue::Number(v as f64)
    }
}

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        SampleValue::Bool(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        SampleValue::Text(v.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(v: String) -> Self {
        SampleValue::Text(v)
    }
}

/// An opaque telemetry sample tagged with a discriminator and, optionally,
/// the provider that produced it.
///
/// # Example
///
/// ```rust
/// use queuescope_types::RawSample;
///
/// let sample = RawSample::builder("KafkaBrokerSample")
///     .provider("kafka")
///     .field("brokerId", 1)
///     .field("clusterName", "prod")
///     .field("bytesInPerSecond", 1024000.0)
///     .build();
///
/// assert_eq!(sample.kind, "KafkaBrokerSample");
/// assert!(sample.get("brokerId").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    /// Sample discriminator, e.g. `KafkaBrokerSample`.
    #[cfg_attr(feature = "serde", serde(rename = "eventType", default))]
    pub kind: String,

    /// Explicit provider tag. Takes precedence over fingerprinting.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub provider: Option<String>,

    /// Every other reported field.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub fields: BTreeMap<String, SampleValue>,
}

impl RawSample {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            provider: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn builder(kind: impl Into<String>) -> RawSampleBuilder {
        RawSampleBuilder {
            sample: RawSample::new(kind),
        }
    }

    /// Look up a field, treating explicit nulls as absent.
    pub fn get(&self, key: &str) -> Option<&SampleValue> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Builder for `RawSample`, mostly useful in tests and fixtures.
#[derive(Debug)]
pub struct RawSampleBuilder {
    sample: RawSample,
}

impl RawSampleBuilder {
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.sample.provider = Some(provider.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<SampleValue>) -> Self {
        self.sample.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> RawSample {
        self.sample
    }
}

/// Message queue providers with a transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ProviderKind {
    Kafka,
    RabbitMq,
    Sqs,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Kafka, ProviderKind::RabbitMq, ProviderKind::Sqs];

    /// Canonical lowercase name, used verbatim in GUIDs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Kafka => "kafka",
            ProviderKind::RabbitMq => "rabbitmq",
            ProviderKind::Sqs => "sqs",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider tag names no known provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProviderError(pub String);

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider '{}'", self.0)
    }
}

impl std::error::Error for ParseProviderError {}

impl FromStr for ProviderKind {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" | "msk" | "aws-msk" | "confluent" => Ok(ProviderKind::Kafka),
            "rabbitmq" | "rabbit" | "rabbit-mq" => Ok(ProviderKind::RabbitMq),
            "sqs" | "aws-sqs" | "amazon-sqs" => Ok(ProviderKind::Sqs),
            _ => Err(ParseProviderError(s.to_string())),
        }
    }
}
