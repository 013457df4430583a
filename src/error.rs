//! Error types for methodcard-core.

use thiserror::Error;

/// Result type alias using methodcard-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline stage (or lookup operation) in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Draft generation stage
    Draft,
    /// QC/finalize review stage
    Review,
    /// Standards search lookup
    Search,
    /// Method detail lookup
    Detail,
    /// Standards comparison lookup
    Compare,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Review => write!(f, "review"),
            Self::Search => write!(f, "search"),
            Self::Detail => write!(f, "detail"),
            Self::Compare => write!(f, "compare"),
        }
    }
}

/// Errors that can occur during method-card generation.
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure or oracle unreachable
    #[error("Transport error: {0}")]
    Transport(String),

    /// The oracle returned an explicit error response
    #[error("Oracle rejected request ({status}): {message}")]
    OracleRejection { status: u16, message: String },

    /// The payload does not conform to the declared response schema
    /// and no safe default applies
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Required user input missing; caught before any external call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Per-call deadline exceeded
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The call was cancelled at a call boundary
    #[error("Operation cancelled")]
    Cancelled,

    /// A workflow run is already in flight
    #[error("A workflow run is already in progress")]
    Busy,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error attributed to a specific pipeline stage
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an oracle rejection error.
    pub fn oracle_rejection(status: u16, message: impl Into<String>) -> Self {
        Self::OracleRejection {
            status,
            message: message.into(),
        }
    }

    /// Create a schema violation error.
    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::SchemaViolation(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Attribute this error to a pipeline stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            // Already attributed; keep the innermost stage.
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures and timeouts are transient; schema violations,
    /// oracle rejections and validation failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Stage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attribution() {
        let err = Error::transport("connection refused").in_stage(Stage::Draft);
        assert_eq!(err.stage(), Some(Stage::Draft));
        assert!(err.to_string().contains("draft stage failed"));
    }

    #[test]
    fn test_stage_attribution_keeps_innermost() {
        let err = Error::schema_violation("missing field")
            .in_stage(Stage::Review)
            .in_stage(Stage::Draft);
        assert_eq!(err.stage(), Some(Stage::Review));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::transport("reset").is_retryable());
        assert!(Error::timeout(5000).is_retryable());
        assert!(Error::transport("reset")
            .in_stage(Stage::Review)
            .is_retryable());
        assert!(!Error::schema_violation("bad shape").is_retryable());
        assert!(!Error::validation("analyte required").is_retryable());
        assert!(!Error::Busy.is_retryable());
    }
}
