//! Recognizer abstraction and the recognition dispatcher.
//!
//! The `Recognizer` trait decouples the session from any specific backend
//! (ML Kit digital ink, an on-device ONNX model, the stub). The dispatcher
//! owns the policy around it: pick the model, require it to be present, call
//! the backend, keep its ranking untouched.

pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::context::RecognitionContext;
use crate::diagnostics::SessionDiagnostics;
use crate::error::{InkError, Result};
use crate::ink::Ink;
use crate::ipc::events::RecognitionResults;
use crate::registry::{ModelHandle, ModelIdentifier, ModelRegistry, PresenceState};

/// Contract for handwriting recognition backends.
#[async_trait]
pub trait Recognizer: Send + Sync + 'static {
    /// Recognise `ink` with `model`, biased by `context`.
    ///
    /// # Returns
    /// Candidates in the backend's rank order, best first. May be empty.
    ///
    /// # Errors
    /// Any error is reported to the caller as `RecognitionFailed`.
    async fn recognize(
        &self,
        ink: &Ink,
        context: &RecognitionContext,
        model: &ModelIdentifier,
    ) -> Result<Vec<Candidate>>;
}

/// One recognised text hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub score: f32,
}

impl Candidate {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Candidates in recognizer order, plus the model that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidates {
    pub model: ModelIdentifier,
    pub candidates: Vec<Candidate>,
}

impl RankedCandidates {
    pub fn texts(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.text.as_str()).collect()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Split into the column-wise wire shape.
    pub fn to_results(&self) -> RecognitionResults {
        RecognitionResults {
            candidates: self.candidates.iter().map(|c| c.text.clone()).collect(),
            scores: self.candidates.iter().map(|c| c.score).collect(),
        }
    }
}

pub struct RecognitionDispatcher {
    registry: Arc<ModelRegistry>,
    recognizer: Arc<dyn Recognizer>,
    default_model: ModelHandle,
    diagnostics: Arc<SessionDiagnostics>,
}

impl RecognitionDispatcher {
    pub fn new(
        registry: Arc<ModelRegistry>,
        recognizer: Arc<dyn Recognizer>,
        default_model: ModelHandle,
        diagnostics: Arc<SessionDiagnostics>,
    ) -> Self {
        Self {
            registry,
            recognizer,
            default_model,
            diagnostics,
        }
    }

    pub fn default_model(&self) -> &ModelHandle {
        &self.default_model
    }

    /// Recognise `ink` with the requested model, or the default when none
    /// (or an empty tag) is given.
    ///
    /// Never downloads: a missing model fails with `ModelNotReady` and there
    /// is no fallback to the default.
    pub async fn recognize(
        &self,
        ink: &Ink,
        context: &RecognitionContext,
        requested_model: Option<&str>,
    ) -> Result<RankedCandidates> {
        let mut target = match requested_model.filter(|tag| !tag.trim().is_empty()) {
            Some(tag) => self.registry.resolve(tag)?,
            None => self.default_model.clone(),
        };

        let span = info_span!("recognize", model = %target.identifier, strokes = ink.strokes().len());
        async {
            if !self.registry.is_downloaded(&target).await? {
                target.presence = PresenceState::NotDownloaded;
                debug!("target model is not on device");
                return Err(InkError::ModelNotReady {
                    tag: target.language_tag().to_string(),
                });
            }
            target.presence = PresenceState::Downloaded;

            SessionDiagnostics::bump(&self.diagnostics.recognitions);
            let candidates = self
                .recognizer
                .recognize(ink, context, &target.identifier)
                .await
                .map_err(|e| {
                    SessionDiagnostics::bump(&self.diagnostics.recognition_errors);
                    warn!(error = %e, "recognizer failed");
                    InkError::RecognitionFailed(e.into_detail())
                })?;

            debug!(candidates = candidates.len(), "recognition finished");
            Ok(RankedCandidates {
                model: target.identifier.clone(),
                candidates,
            })
        }
        .instrument(span)
        .await
    }
}
