//! Metric categorization and RED/USE summaries.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use queuescope_types::MetricValue;
use regex::{Regex, RegexBuilder};
use tracing::error;

/// Coarse metric categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricCategory {
    Throughput,
    Latency,
    Errors,
    Utilization,
    Custom,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Throughput => "throughput",
            MetricCategory::Latency => "latency",
            MetricCategory::Errors => "errors",
            MetricCategory::Utilization => "utilization",
            MetricCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category patterns, checked in this order.
const CATEGORY_PATTERNS: &[(MetricCategory, &str)] = &[
    (
        MetricCategory::Errors,
        r"error|fail|reject|offline|underReplicated|unavailable|dead",
    ),
    (
        MetricCategory::Latency,
        r"latency|duration|(?-i:(Time|Ms|Seconds)$)|(?-i:Age)",
    ),
    (
        MetricCategory::Utilization,
        r"cpu|memory|disk|percent|utilization|fileDescriptors|lag|ready|unacknowledged|delayed|backlog|depth",
    ),
    (
        MetricCategory::Throughput,
        r"PerSecond$|Rate$|bytes|^messages(In|Out|Published|Delivered|Consumed)",
    ),
];

/// Metrics counted towards saturation in a USE summary.
const SATURATION_PATTERN: &str =
    r"^(total)?lag$|^messages(Ready|Unacknowledged|Delayed)$|backlog|depth";

/// Message rates counted in a RED summary.
const RATE_PATTERN: &str = r"^messages.*(PerSecond|Rate)$";

fn compile(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            error!(pattern, error = %e, "invalid category pattern");
            None
        }
    }
}

static CATEGORIES: Lazy<Vec<(MetricCategory, Regex)>> = Lazy::new(|| {
    CATEGORY_PATTERNS
        .iter()
        .filter_map(|(category, pattern)| compile(pattern).map(|r| (*category, r)))
        .collect()
});

static SATURATION: Lazy<Option<Regex>> = Lazy::new(|| compile(SATURATION_PATTERN));
static RATE: Lazy<Option<Regex>> = Lazy::new(|| compile(RATE_PATTERN));

/// Category of a metric name.
pub fn categorize(metric: &str) -> MetricCategory {
    CATEGORIES
        .iter()
        .find(|(_, regex)| regex.is_match(metric))
        .map(|(category, _)| *category)
        .unwrap_or(MetricCategory::Custom)
}

fn matches(regex: &Option<Regex>, metric: &str) -> bool {
    match regex {
        Some(r) => r.is_match(metric),
        None => false,
    }
}

/// Numeric metrics grouped by category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryRollup {
    pub categories: BTreeMap<MetricCategory, BTreeMap<String, f64>>,
}

impl CategoryRollup {
    pub fn from_metrics(metrics: &BTreeMap<String, MetricValue>) -> Self {
        let mut rollup = CategoryRollup::default();
        for (name, value) in metrics {
            if let Some(v) = value.as_f64() {
                rollup
                    .categories
                    .entry(categorize(name))
                    .or_default()
                    .insert(name.clone(), v);
            }
        }
        rollup
    }

    pub fn count(&self, category: MetricCategory) -> usize {
        self.categories.get(&category).map_or(0, BTreeMap::len)
    }

    pub fn total(&self, category: MetricCategory) -> f64 {
        self.categories
            .get(&category)
            .map_or(0.0, |m| m.values().sum())
    }

    fn max(&self, category: MetricCategory) -> Option<f64> {
        self.categories
            .get(&category)
            .and_then(|m| m.values().copied().reduce(f64::max))
    }
}

/// Rate, errors, duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedSummary {
    /// Sum of message rates.
    pub rate: f64,
    /// Sum of error-category metrics.
    pub errors: f64,
    /// Worst latency, if any latency metric is reported.
    pub duration: Option<f64>,
}

impl RedSummary {
    pub fn from_metrics(metrics: &BTreeMap<String, MetricValue>) -> Self {
        let rollup = CategoryRollup::from_metrics(metrics);
        let rate = metrics
            .iter()
            .filter(|(name, _)| matches(&RATE, name))
            .filter_map(|(_, v)| v.as_f64())
            .sum();

        Self {
            rate,
            errors: rollup.total(MetricCategory::Errors),
            duration: rollup.max(MetricCategory::Latency),
        }
    }
}

/// Utilization, saturation, errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UseSummary {
    /// Highest percentage gauge, if any.
    pub utilization: Option<f64>,
    /// Sum of lag, backlog and queue-depth metrics.
    pub saturation: f64,
    pub errors: f64,
}

impl UseSummary {
    pub fn from_metrics(metrics: &BTreeMap<String, MetricValue>) -> Self {
        let rollup = CategoryRollup::from_metrics(metrics);
        let utilization = metrics
            .iter()
            .filter(|(name, _)| name.ends_with("Percent"))
            .filter_map(|(_, v)| v.as_f64())
            .reduce(f64::max);
        let saturation = metrics
            .iter()
            .filter(|(name, _)| matches(&SATURATION, name))
            .filter_map(|(_, v)| v.as_f64())
            .sum();

        Self {
            utilization,
            saturation,
            errors: rollup.total(MetricCategory::Errors),
        }
    }
}
