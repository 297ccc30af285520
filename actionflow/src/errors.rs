//! Error types for remote actions.
//!
//! The taxonomy has three classes: validation failures raised before any
//! collaborator is contacted, stage failures tagged with the stage that
//! produced them, and cancellation, which is a silent terminal state.

use thiserror::Error;

/// Result type returned by every remote action.
pub type ActionResult<T> = Result<T, RemoteError>;

/// The main error type for remote action execution.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The channel was missing or empty.
    #[error("Channel missing")]
    ChannelMissing,

    /// No byte source was supplied.
    #[error("Invalid arguments: byte source cannot be absent")]
    ByteSourceMissing,

    /// The file name was missing or empty.
    #[error("Invalid arguments: file name cannot be empty")]
    FileNameMissing,

    /// A pipeline stage failed.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// Tag of the stage that failed (e.g. "transfer").
        stage: String,
        /// The collaborator error.
        #[source]
        source: anyhow::Error,
    },

    /// The action was silently cancelled.
    #[error("Action cancelled")]
    Cancelled,

    /// The execution pool lost the worker task.
    #[error("Execution pool error: {0}")]
    Pool(String),
}

impl RemoteError {
    /// Creates a stage error.
    pub fn stage(stage: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Returns the stage tag for stage errors.
    #[must_use]
    pub fn stage_tag(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns true for errors raised by argument validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ChannelMissing | Self::ByteSourceMissing | Self::FileNameMissing
        )
    }

    /// Returns true if the action was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<tokio::task::JoinError> for RemoteError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Pool(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = RemoteError::stage("transfer", anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "Stage 'transfer' failed: connection reset");
        assert_eq!(err.stage_tag(), Some("transfer"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(RemoteError::ChannelMissing.is_validation());
        assert!(RemoteError::ByteSourceMissing.is_validation());
        assert!(RemoteError::FileNameMissing.is_validation());
        assert!(!RemoteError::Cancelled.is_validation());
        assert!(RemoteError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_stage_error_keeps_source() {
        let err = RemoteError::stage("publish", anyhow::anyhow!("403"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source, Some("403".to_string()));
        assert!(err.stage_tag().is_some());
        assert!(RemoteError::ChannelMissing.stage_tag().is_none());
    }
}
