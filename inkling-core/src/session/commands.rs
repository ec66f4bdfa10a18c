//! Request dispatch: one `Request` variant → one `InkSession` method.

use std::collections::BTreeSet;

use tracing::debug;

use crate::batch::BatchStream;
use crate::error::Result;
use crate::inference::RankedCandidates;
use crate::ink::StrokeAppended;
use crate::ipc::events::{AckResponse, BatchEvent, ModelsResponse, RecognitionResponse};
use crate::ipc::request::Request;
use crate::registry::ModelIdentifier;
use crate::session::InkSession;

/// Outcome of one handled request.
#[derive(Debug)]
pub enum Reply {
    Erased,
    StrokeAppended(StrokeAppended),
    Recognized(RankedCandidates),
    /// Single terminal model event (`deleteModel`).
    Event(BatchEvent),
    /// Multi-event model batch; drain until it closes.
    Stream(BatchStream),
    Models(BTreeSet<ModelIdentifier>),
}

impl Reply {
    /// Wire representation for single-shot replies. `Stream` has none: its
    /// events are written one by one as they arrive.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        let value = match self {
            Reply::Erased => {
                serde_json::to_value(AckResponse::ok("Erased stored stroke and point data."))
            }
            Reply::StrokeAppended(ack) => serde_json::to_value(AckResponse::ok(ack.message())),
            Reply::Recognized(ranked) => serde_json::to_value(RecognitionResponse {
                ok: true,
                msg: "Recognized successfully".into(),
                model: ranked.model.language_tag().to_string(),
                results: ranked.to_results(),
            }),
            Reply::Event(event) => serde_json::to_value(event),
            Reply::Models(models) => serde_json::to_value(ModelsResponse {
                ok: true,
                msg: if models.is_empty() {
                    "No models are downloaded.".into()
                } else {
                    "Successfully retrieved models.".into()
                },
                models: models.iter().map(|m| m.language_tag().to_string()).collect(),
            }),
            Reply::Stream(_) => return None,
        };
        value.ok()
    }
}

impl InkSession {
    /// Dispatch one host request.
    pub async fn handle(&self, request: Request) -> Result<Reply> {
        debug!(op = request.name(), "handling request");
        match request {
            Request::Erase => {
                self.erase();
                Ok(Reply::Erased)
            }
            Request::LogStroke(payload) => self.log_stroke(&payload).map(Reply::StrokeAppended),
            Request::Recognize { model, context } => self
                .recognize(model.as_deref(), context.as_ref())
                .await
                .map(Reply::Recognized),
            Request::DownloadModel { model } => self.download_model(&model).map(Reply::Stream),
            Request::DownloadModels { models } => Ok(Reply::Stream(self.download_models(models))),
            Request::DeleteModel { model } => self.delete_model(&model).await.map(Reply::Event),
            Request::DeleteModels { models } => Ok(Reply::Stream(self.delete_models(models))),
            Request::DeleteAllModels => self.delete_all_models().await.map(Reply::Stream),
            Request::ListDownloadedModels => {
                self.list_downloaded_models().await.map(Reply::Models)
            }
        }
    }
}
