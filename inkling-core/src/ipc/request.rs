//! Operations a host can ask of a session, one variant per operation.
//!
//! Serialised with an `"op"` tag, e.g.
//! `{"op": "logStroke", "x": [0, 1], "y": [0, 1]}` or
//! `{"op": "recognize", "model": "fr-FR", "context": ["bon", [300, 60]]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ink::StrokePayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    Erase,
    LogStroke(StrokePayload),
    Recognize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },
    DownloadModel {
        model: String,
    },
    DownloadModels {
        models: Vec<String>,
    },
    DeleteModel {
        model: String,
    },
    DeleteModels {
        models: Vec<String>,
    },
    DeleteAllModels,
    ListDownloadedModels,
}

impl Request {
    /// Wire name of the operation, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Erase => "erase",
            Request::LogStroke(_) => "logStroke",
            Request::Recognize { .. } => "recognize",
            Request::DownloadModel { .. } => "downloadModel",
            Request::DownloadModels { .. } => "downloadModels",
            Request::DeleteModel { .. } => "deleteModel",
            Request::DeleteModels { .. } => "deleteModels",
            Request::DeleteAllModels => "deleteAllModels",
            Request::ListDownloadedModels => "listDownloadedModels",
        }
    }
}
