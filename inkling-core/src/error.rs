use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by inkling-core.
///
/// `Clone` so a single store failure can be handed to every caller joined to
/// the same in-flight download.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InkError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("malformed recognition context: {0}")]
    MalformedContext(String),

    #[error("{tag} is not a valid model identifier")]
    InvalidModel { tag: String },

    #[error("{tag} model is not downloaded")]
    ModelNotReady { tag: String },

    #[error("cannot delete {tag} model, it is not downloaded")]
    NotDownloaded { tag: String },

    #[error("model store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("recognition failed: {0}")]
    RecognitionFailed(String),
}

impl InkError {
    /// Machine-readable classification for callers that react programmatically.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InkError::MalformedInput(_) => ErrorKind::MalformedInput,
            InkError::MalformedContext(_) => ErrorKind::MalformedContext,
            InkError::InvalidModel { .. } => ErrorKind::InvalidModel,
            InkError::ModelNotReady { .. } => ErrorKind::ModelNotReady,
            InkError::NotDownloaded { .. } => ErrorKind::NotDownloaded,
            InkError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            InkError::RecognitionFailed(_) => ErrorKind::RecognitionFailed,
        }
    }

    /// Message without the variant prefix, for re-wrapping under another kind.
    pub fn into_detail(self) -> String {
        match self {
            InkError::MalformedInput(detail)
            | InkError::MalformedContext(detail)
            | InkError::StoreUnavailable(detail)
            | InkError::RecognitionFailed(detail) => detail,
            other => other.to_string(),
        }
    }
}

/// Serialisable error discriminant, mirrored in host replies and batch events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MalformedInput,
    MalformedContext,
    InvalidModel,
    ModelNotReady,
    NotDownloaded,
    StoreUnavailable,
    RecognitionFailed,
}

pub type Result<T> = std::result::Result<T, InkError>;
