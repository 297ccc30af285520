//! Status objects delivered to asynchronous callbacks.

use crate::errors::RemoteError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Arguments were rejected before any stage ran.
    Validation,
    /// A stage reported a failure.
    StageFailure,
    /// The action was cancelled.
    Cancelled,
    /// The execution pool failed to run the action.
    Internal,
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::StageFailure => write!(f, "stage_failure"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl From<&RemoteError> for StatusCategory {
    fn from(err: &RemoteError) -> Self {
        match err {
            RemoteError::ChannelMissing
            | RemoteError::ByteSourceMissing
            | RemoteError::FileNameMissing => Self::Validation,
            RemoteError::Stage { .. } => Self::StageFailure,
            RemoteError::Cancelled => Self::Cancelled,
            RemoteError::Pool(_) => Self::Internal,
        }
    }
}

/// Error status handed to a callback when an action fails.
///
/// The status owns the underlying [`RemoteError`] so callers can inspect
/// the stage tag and the collaborator's source error.
#[derive(Debug)]
pub struct ActionStatus {
    category: StatusCategory,
    stage: Option<String>,
    message: String,
    error: RemoteError,
}

impl ActionStatus {
    /// Builds a status from an error.
    #[must_use]
    pub fn from_error(error: RemoteError) -> Self {
        Self {
            category: StatusCategory::from(&error),
            stage: error.stage_tag().map(str::to_string),
            message: error.to_string(),
            error,
        }
    }

    /// Always true; a status only exists for failed actions.
    #[must_use]
    pub fn is_error(&self) -> bool {
        true
    }

    /// Returns the status category.
    #[must_use]
    pub fn category(&self) -> StatusCategory {
        self.category
    }

    /// Returns the tag of the failing stage, if a stage failed.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying error.
    #[must_use]
    pub fn error(&self) -> &RemoteError {
        &self.error
    }

    /// Consumes the status, returning the underlying error.
    #[must_use]
    pub fn into_error(self) -> RemoteError {
        self.error
    }
}

impl From<RemoteError> for ActionStatus {
    fn from(error: RemoteError) -> Self {
        Self::from_error(error)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}
