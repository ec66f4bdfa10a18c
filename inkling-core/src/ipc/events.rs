//! Reply and event types written back to the host.
//!
//! | Type | Emitted by |
//! |------|------------|
//! | `AckResponse` | `erase`, `logStroke` |
//! | `RecognitionResponse` | `recognize` |
//! | `ModelsResponse` | `listDownloadedModels` |
//! | `BatchEvent` | `downloadModel(s)`, `deleteModel(s)`, `deleteAllModels` |
//! | `ErrorResponse` | any operation that fails outright |
//! | `ModelStatusEvent` | model registry broadcast channel |

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, InkError};

// ---------------------------------------------------------------------------
// Call / response replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub ok: bool,
    pub msg: String,
}

impl AckResponse {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            ok: true,
            msg: msg.into(),
        }
    }
}

/// Column-wise candidate list: `candidates[i]` is scored by `scores[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResults {
    pub candidates: Vec<String>,
    pub scores: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResponse {
    pub ok: bool,
    pub msg: String,
    /// Language tag of the model that produced the results.
    pub model: String,
    pub results: RecognitionResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub ok: bool,
    pub msg: String,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub ok: bool,
    pub kind: ErrorKind,
    pub msg: String,
}

impl From<&InkError> for ErrorResponse {
    fn from(err: &InkError) -> Self {
        Self {
            ok: false,
            kind: err.kind(),
            msg: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch events
// ---------------------------------------------------------------------------

/// One notification from a model batch.
///
/// `item` is `None` only for the "processing started" banner. `done` is set
/// on exactly one event per batch: the one that completed last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvent {
    pub ok: bool,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl BatchEvent {
    pub fn started(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            done: false,
            item: None,
            message: message.into(),
            error: None,
        }
    }

    pub fn succeeded(item: impl Into<String>, message: impl Into<String>, done: bool) -> Self {
        Self {
            ok: true,
            done,
            item: Some(item.into()),
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(item: impl Into<String>, err: &InkError, done: bool) -> Self {
        Self {
            ok: false,
            done,
            item: Some(item.into()),
            message: err.to_string(),
            error: Some(err.kind()),
        }
    }

    /// Terminal event for a batch with no items.
    pub fn nothing_to_do(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            done: true,
            item: None,
            message: message.into(),
            error: None,
        }
    }

    pub fn is_banner(&self) -> bool {
        self.item.is_none() && !self.done
    }
}

// ---------------------------------------------------------------------------
// Model status events
// ---------------------------------------------------------------------------

/// Broadcast whenever the registry changes a model's on-device presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatusEvent {
    pub model: String,
    pub status: ModelStatus,
    /// Optional human-readable detail (e.g. store error message).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelStatus {
    /// A transfer was handed to the model store.
    Downloading,
    Downloaded,
    DownloadFailed,
    Deleted,
}
