//! Error taxonomy for the answer pipeline.
//!
//! Functions return [`anyhow::Result`]; the variants below are raised where a
//! caller may want to react to the kind of failure, and can be recovered with
//! `err.downcast_ref::<DocQaError>()`.
//!
//! | Variant | Surfaced to caller? |
//! |---------|---------------------|
//! | [`UnsupportedFormat`](DocQaError::UnsupportedFormat) | yes, fail fast |
//! | [`UnsupportedModel`](DocQaError::UnsupportedModel) | yes, fail fast |
//! | [`Extraction`](DocQaError::Extraction) | yes, for the offending file |
//! | [`EmbeddingService`](DocQaError::EmbeddingService) | no, batch skipped |
//! | [`EvaluationFailure`](DocQaError::EvaluationFailure) | no, text kept |
//! | [`OcrTimeout`](DocQaError::OcrTimeout) | no, image dropped |

use crate::models::FileKind;

#[derive(Debug, Clone, PartialEq)]
pub enum DocQaError {
    /// File extension is not one of the supported kinds.
    UnsupportedFormat(String),
    /// Completion backend name is not recognized.
    UnsupportedModel(String),
    /// File content is malformed for its declared kind.
    Extraction { kind: FileKind, message: String },
    /// Embedding call failed. `retryable` marks rate limits and transient errors.
    EmbeddingService { retryable: bool, message: String },
    /// A bracketed expression could not be evaluated.
    EvaluationFailure { expression: String, message: String },
    /// Image text decoding did not complete within the polling budget.
    OcrTimeout { pending: usize, rounds: u32 },
}

impl DocQaError {
    pub fn extraction(kind: FileKind, message: impl ToString) -> Self {
        DocQaError::Extraction {
            kind,
            message: message.to_string(),
        }
    }

    pub fn embedding(retryable: bool, message: impl Into<String>) -> Self {
        DocQaError::EmbeddingService {
            retryable,
            message: message.into(),
        }
    }

    /// True for errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocQaError::EmbeddingService {
                retryable: true,
                ..
            }
        )
    }
}

impl std::fmt::Display for DocQaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocQaError::UnsupportedFormat(ext) => {
                write!(f, "File type {} not supported", ext)
            }
            DocQaError::UnsupportedModel(name) => {
                write!(f, "Model {} not supported", name)
            }
            DocQaError::Extraction { kind, message } => {
                write!(f, "{} extraction failed: {}", kind, message)
            }
            DocQaError::EmbeddingService { message, .. } => {
                write!(f, "embedding service error: {}", message)
            }
            DocQaError::EvaluationFailure {
                expression,
                message,
            } => write!(f, "could not evaluate '{}': {}", expression, message),
            DocQaError::OcrTimeout { pending, rounds } => write!(
                f,
                "{} image(s) still pending after {} polling round(s)",
                pending, rounds
            ),
        }
    }
}

impl std::error::Error for DocQaError {}
