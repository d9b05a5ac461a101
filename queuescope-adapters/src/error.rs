//! Error types for transformers.

use thiserror::Error;

/// Errors that can occur when transforming a single raw sample.
///
/// These are per-sample failures: a batch transform records them and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// The sample is missing identity, has an unknown discriminator, or is
    /// otherwise malformed for its provider.
    #[error("invalid sample '{kind}': {reason}")]
    InvalidSample { kind: String, reason: String },

    /// No provider could be determined for the sample.
    #[error("unknown provider for sample '{kind}': {hint}")]
    UnknownProvider { kind: String, hint: String },
}

impl TransformError {
    pub(crate) fn invalid(kind: &str, reason: impl Into<String>) -> Self {
        TransformError::InvalidSample {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_provider(kind: &str, hint: impl Into<String>) -> Self {
        TransformError::UnknownProvider {
            kind: kind.to_string(),
            hint: hint.into(),
        }
    }

    /// The discriminator of the sample that failed.
    pub fn kind(&self) -> &str {
        match self {
            TransformError::InvalidSample { kind, .. } | TransformError::UnknownProvider { kind, .. } => {
                kind
            }
        }
    }
}
