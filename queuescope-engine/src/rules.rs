//! The metric aggregation rule table.
//!
//! Rules are selected by metric name alone, so the same metric always reduces
//! the same way regardless of the values seen. Patterns are matched
//! case-insensitively in table order and the first match wins; a pattern can
//! opt back into case sensitivity with an inline `(?-i)` flag.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::error;

/// How values for the same metric are reduced across records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationRule {
    /// Throughput counters and rates.
    Sum,
    /// Worst-case health indicators.
    Max,
    /// Utilization gauges.
    Avg,
    /// State flags and labels: the last value in input order.
    Latest,
}

impl AggregationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationRule::Sum => "sum",
            AggregationRule::Max => "max",
            AggregationRule::Avg => "avg",
            AggregationRule::Latest => "latest",
        }
    }

    /// Whether the rule needs numeric values.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, AggregationRule::Latest)
    }
}

impl fmt::Display for AggregationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule used when no pattern matches.
pub const DEFAULT_RULE: AggregationRule = AggregationRule::Sum;

/// Pattern table in match order.
///
/// Summing where `max` is required hides worst-case risk: under-replicated
/// counts of 5, 3 and 8 across brokers must aggregate to 8, not 16.
pub const AGGREGATION_RULES: &[(&str, AggregationRule)] = &[
    ("InPerSecond$", AggregationRule::Sum),
    ("OutPerSecond$", AggregationRule::Sum),
    ("bytes", AggregationRule::Sum),
    ("messages.*Rate", AggregationRule::Sum),
    ("underReplicated", AggregationRule::Max),
    ("offline", AggregationRule::Max),
    ("lag.*Max", AggregationRule::Max),
    ("cpu", AggregationRule::Avg),
    ("memory", AggregationRule::Avg),
    ("disk.*Usage", AggregationRule::Avg),
    ("Percent$", AggregationRule::Avg),
    ("count", AggregationRule::Sum),
    ("partitions", AggregationRule::Sum),
    ("(?-i)^is[A-Z]", AggregationRule::Latest),
    ("State$", AggregationRule::Latest),
    ("Status$", AggregationRule::Latest),
];

static COMPILED: Lazy<Vec<(Regex, AggregationRule)>> = Lazy::new(|| {
    AGGREGATION_RULES
        .iter()
        .filter_map(|(pattern, rule)| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => Some((regex, *rule)),
                Err(e) => {
                    error!(pattern, error = %e, "invalid aggregation pattern");
                    None
                }
            }
        })
        .collect()
});

/// Rule for a metric name.
pub fn rule_for(metric: &str) -> AggregationRule {
    COMPILED
        .iter()
        .find(|(regex, _)| regex.is_match(metric))
        .map(|(_, rule)| *rule)
        .unwrap_or(DEFAULT_RULE)
}
