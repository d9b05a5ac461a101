//! Error types for the engine.

use thiserror::Error;

/// Boxed error returned by hook and middleware handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the engine to its caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An extension point name that is not in the catalogue.
    #[error("invalid extension point '{0}'")]
    InvalidExtensionPoint(String),

    /// Registering another hook would exceed the per-point cap.
    #[error("extension point '{point}' already has {limit} hooks")]
    HookLimitExceeded { point: String, limit: usize },

    /// A hook failed while `stop_on_error` is set.
    #[error("hook '{hook}' at '{point}' aborted the cycle: {source}")]
    HookAborted {
        point: String,
        hook: String,
        #[source]
        source: HookError,
    },

    /// A middleware returned an error.
    #[error("middleware '{name}' failed: {message}")]
    Middleware { name: String, message: String },

    /// A stage received a payload of the wrong kind from its hooks.
    #[error("stage '{point}' expected {expected} but got {actual}")]
    PayloadMismatch {
        point: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// A single hook failure. Failures are isolated: the pipeline carries on
/// with the last good payload unless configured to stop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HookError {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("execution failed: {0}")]
    Execution(String),

    /// The hook returned a payload of a different kind than it was given.
    #[error("returned {actual} where {expected} was expected")]
    PayloadMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors from metric aggregation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// A reducing rule met a value with no numeric view.
    #[error("rule {rule} cannot reduce non-numeric metric '{metric}'")]
    RuleMismatch { metric: String, rule: &'static str },
}
