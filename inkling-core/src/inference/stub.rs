//! `StubRecognizer`: placeholder backend that describes the ink instead of
//! reading it.
//!
//! Produces a deterministic, non-empty candidate list for any non-empty ink
//! so the full session/IPC path can be exercised without a real model.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::context::RecognitionContext;
use crate::error::{InkError, Result};
use crate::inference::{Candidate, Recognizer};
use crate::ink::Ink;
use crate::registry::ModelIdentifier;

/// What the stub was last asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model: ModelIdentifier,
    pub context: RecognitionContext,
    pub stroke_count: usize,
}

/// Echo-style stub recognizer.
///
/// For non-empty ink it returns, in this order:
/// 1. `"<pre-text><N> strokes"` (score 0.5)
/// 2. `"<pre-text><P> points"` (score 1.25)
/// 3. `"<pre-text>[<model>]"` (score 2.0)
///
/// A fixed script can replace the generated list, and a failure detail makes
/// every call fail with `RecognitionFailed`.
#[derive(Default)]
pub struct StubRecognizer {
    scripted: Option<Vec<Candidate>>,
    failure: Option<String>,
    last: Mutex<Option<RecordedRequest>>,
}

impl StubRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `candidates`, in the given order.
    pub fn scripted(candidates: Vec<Candidate>) -> Self {
        Self {
            scripted: Some(candidates),
            ..Self::default()
        }
    }

    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            failure: Some(detail.into()),
            ..Self::default()
        }
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl Recognizer for StubRecognizer {
    async fn recognize(
        &self,
        ink: &Ink,
        context: &RecognitionContext,
        model: &ModelIdentifier,
    ) -> Result<Vec<Candidate>> {
        *self.last.lock() = Some(RecordedRequest {
            model: model.clone(),
            context: context.clone(),
            stroke_count: ink.strokes().len(),
        });
        debug!(model = %model, strokes = ink.strokes().len(), "StubRecognizer::recognize");

        if let Some(detail) = &self.failure {
            return Err(InkError::RecognitionFailed(detail.clone()));
        }
        if let Some(script) = &self.scripted {
            return Ok(script.clone());
        }
        if ink.is_empty() {
            return Ok(Vec::new());
        }

        let pre = &context.pre_text;
        Ok(vec![
            Candidate::new(format!("{pre}{} strokes", ink.strokes().len()), 0.5),
            Candidate::new(format!("{pre}{} points", ink.point_count()), 1.25),
            Candidate::new(format!("{pre}[{model}]"), 2.0),
        ])
    }
}
