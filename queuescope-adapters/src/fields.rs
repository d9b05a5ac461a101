//! Field-mapping tables and the reader that applies them.
//!
//! Agents spell the same metric differently across versions and
//! integrations, so every canonical metric is looked up through a fallback
//! chain of source names: the first source present wins. Fields that no
//! mapping consumes are passed through unchanged.

use std::collections::BTreeSet;

use queuescope_types::{CanonicalMetricRecord, MetricValue, RawSample, SampleValue};

/// Maps one canonical metric to its source spellings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMapping {
    pub canonical: &'static str,
    /// Source field names in fallback order.
    pub sources: &'static [&'static str],
    /// Value used when every source is absent. `None` omits the metric.
    pub default: Option<f64>,
}

impl FieldMapping {
    /// A core metric, reported as `0` when the sample does not carry it.
    pub const fn core(canonical: &'static str, sources: &'static [&'static str]) -> Self {
        Self {
            canonical,
            sources,
            default: Some(0.0),
        }
    }

    /// An optional metric, omitted when absent.
    pub const fn optional(canonical: &'static str, sources: &'static [&'static str]) -> Self {
        Self {
            canonical,
            sources,
            default: None,
        }
    }
}

/// Reads a raw sample through fallback chains, remembering which fields
/// have been consumed so the remainder can be passed through.
pub(crate) struct SampleReader<'a> {
    sample: &'a RawSample,
    consumed: BTreeSet<&'static str>,
}

impl<'a> SampleReader<'a> {
    pub(crate) fn new(sample: &'a RawSample) -> Self {
        Self {
            sample,
            consumed: BTreeSet::new(),
        }
    }

    /// First present source, marking the whole chain consumed.
    fn first(&mut self, sources: &[&'static str]) -> Option<&'a SampleValue> {
        let mut found = None;
        for source in sources {
            self.consumed.insert(*source);
            if found.is_none() {
                found = self.sample.get(source);
            }
        }
        found
    }

    /// Identity value from a fallback chain. Numeric ids render as integers.
    pub(crate) fn identity(&mut self, sources: &[&'static str]) -> Option<String> {
        let mut found = None;
        for source in sources {
            self.consumed.insert(*source);
            if found.is_none() {
                found = self.sample.get(source).and_then(SampleValue::as_identity);
            }
        }
        found
    }

    /// Raw text of a field without consuming it.
    pub(crate) fn peek_text(&self, key: &str) -> Option<&'a str> {
        match self.sample.get(key) {
            Some(SampleValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Apply a mapping table to the record.
    pub(crate) fn apply(&mut self, mappings: &[FieldMapping], record: &mut CanonicalMetricRecord) {
        for mapping in mappings {
            let value = self
                .first(mapping.sources)
                .and_then(to_metric)
                .or(mapping.default.map(MetricValue::Number));
            if let Some(value) = value {
                record.metrics.insert(mapping.canonical.to_string(), value);
            }
        }
    }

    /// Pass every unconsumed field through to the record.
    ///
    /// Numbers and numeric text become metrics, flags stay flags, other text
    /// becomes an attribute. Canonical metrics already set are not replaced.
    pub(crate) fn pass_through(self, record: &mut CanonicalMetricRecord) {
        for (key, value) in &self.sample.fields {
            if self.consumed.contains(key.as_str()) || record.metrics.contains_key(key) {
                continue;
            }
            match value {
                SampleValue::Null => {}
                SampleValue::Text(s) if s.trim().parse::<f64>().is_err() => {
                    record.attributes.insert(key.clone(), s.clone());
                }
                other => {
                    if let Some(metric) = to_metric(other) {
                        record.metrics.insert(key.clone(), metric);
                    }
                }
            }
        }
    }
}

fn to_metric(value: &SampleValue) -> Option<MetricValue> {
    match value {
        SampleValue::Null => None,
        SampleValue::Bool(b) => Some(MetricValue::Flag(*b)),
        SampleValue::Number(n) => Some(MetricValue::Number(*n)),
        SampleValue::Text(s) => Some(match s.trim().parse::<f64>() {
            Ok(n) => MetricValue::Number(n),
            Err(_) => MetricValue::Text(s.clone()),
        }),
    }
}

/// Set `target = a + b` when both inputs are numeric.
pub(crate) fn derive_sum(record: &mut CanonicalMetricRecord, target: &str, a: &str, b: &str) {
    if let (Some(x), Some(y)) = (record.metric(a), record.metric(b)) {
        record.metrics.insert(target.to_string(), MetricValue::Number(x + y));
    }
}
