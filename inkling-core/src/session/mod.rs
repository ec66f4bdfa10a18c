//! `InkSession`: top-level controller for one drawing session.
//!
//! ## Lifecycle
//!
//! ```text
//! InkSession::new()            → default model resolved, buffer empty
//!     └─► warm_up()            → optional default-model download
//!         ├─► log_stroke() …   → strokes appended in call order
//!         ├─► recognize()      → seal + dispatch, buffer kept
//!         ├─► erase()          → buffer cleared
//!         └─► download/delete  → registry / batch coordinator
//! ```
//!
//! ## Threading
//!
//! All methods take `&self`; wrap the session in `Arc<InkSession>` to share
//! it with host tasks. The ink buffer sits behind a mutex, but callers are
//! still expected to serialise `log_stroke` / `erase` / `recognize` so strokes
//! land in the order they were drawn.

pub mod commands;

pub use commands::Reply;

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    batch::{BatchCoordinator, BatchStream, ModelOp},
    context::RecognitionContext,
    diagnostics::{DiagnosticsSnapshot, SessionDiagnostics},
    error::Result,
    inference::{RankedCandidates, RecognitionDispatcher, Recognizer},
    ink::{accumulator, Ink, InkBuffer, Stroke, StrokeAppended, StrokePayload},
    ipc::events::{BatchEvent, ModelStatusEvent},
    registry::{DownloadOutcome, ModelHandle, ModelIdentifier, ModelRegistry, ModelStore},
};

/// Configuration for `InkSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Language tag of the session default model. Default: `"en-US"`.
    pub default_model: String,
    /// Buffered model status events for slow subscribers. Default: 64.
    pub event_capacity: usize,
    /// Download the default model during `warm_up()`. Default: false.
    pub download_default_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_model: "en-US".into(),
            event_capacity: 64,
            download_default_on_start: false,
        }
    }
}

pub struct InkSession {
    config: SessionConfig,
    buffer: Mutex<InkBuffer>,
    registry: Arc<ModelRegistry>,
    dispatcher: RecognitionDispatcher,
    batches: BatchCoordinator,
    diagnostics: Arc<SessionDiagnostics>,
}

impl InkSession {
    /// Create a session. Does not touch the store beyond validating the
    /// default model tag.
    ///
    /// # Errors
    /// `InvalidModel` if `config.default_model` is not known to the store.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn ModelStore>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Result<Self> {
        let diagnostics = Arc::new(SessionDiagnostics::default());
        let (status_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let registry = Arc::new(ModelRegistry::new(
            store,
            status_tx,
            Arc::clone(&diagnostics),
        ));
        let default_model = registry.resolve(&config.default_model)?;
        info!(default_model = %default_model.identifier, "ink session created");

        let dispatcher = RecognitionDispatcher::new(
            Arc::clone(&registry),
            recognizer,
            default_model,
            Arc::clone(&diagnostics),
        );
        let batches = BatchCoordinator::new(Arc::clone(&registry), Arc::clone(&diagnostics));

        Ok(Self {
            config,
            buffer: Mutex::new(InkBuffer::new()),
            registry,
            dispatcher,
            batches,
            diagnostics,
        })
    }

    /// Fetch the default model if the config asks for it.
    ///
    /// Returns `None` when prefetching is disabled.
    pub async fn warm_up(&self) -> Result<Option<DownloadOutcome>> {
        if !self.config.download_default_on_start {
            return Ok(None);
        }
        info!(model = %self.default_model().identifier, "prefetching default model");
        self.registry
            .download(self.dispatcher.default_model())
            .await
            .map(Some)
    }

    // ── Ink ─────────────────────────────────────────────────────────────

    /// Discard all pending strokes.
    pub fn erase(&self) {
        self.buffer.lock().reset();
        debug!("ink buffer erased");
    }

    /// Validate a raw stroke payload and append it to the pending ink.
    pub fn log_stroke(&self, payload: &StrokePayload) -> Result<StrokeAppended> {
        let stroke = payload.to_stroke()?;
        Ok(self.append(stroke))
    }

    /// Typed variant of `log_stroke` for in-process callers.
    pub fn log_points(&self, xs: &[f32], ys: &[f32], ts: Option<&[i64]>) -> Result<StrokeAppended> {
        let stroke = accumulator::build_stroke(xs, ys, ts)?;
        Ok(self.append(stroke))
    }

    /// Snapshot of the pending ink. Does not clear it.
    pub fn seal(&self) -> Ink {
        self.buffer.lock().seal()
    }

    pub fn pending_strokes(&self) -> usize {
        self.buffer.lock().len()
    }

    fn append(&self, stroke: Stroke) -> StrokeAppended {
        let point_count = stroke.len();
        let timed = stroke.has_timestamps();
        let stroke_index = self.buffer.lock().append(stroke);
        SessionDiagnostics::bump(&self.diagnostics.strokes_logged);
        debug!(stroke_index, point_count, timed, "stroke appended");
        StrokeAppended {
            stroke_index,
            point_count,
            timed,
        }
    }

    // ── Recognition ─────────────────────────────────────────────────────

    /// Recognise the pending ink. `context` is a raw host payload (see
    /// `RecognitionContext::from_payload`). Input errors are reported before
    /// any store or recognizer call.
    pub async fn recognize(
        &self,
        model: Option<&str>,
        context: Option<&Value>,
    ) -> Result<RankedCandidates> {
        let context = match context {
            Some(payload) => RecognitionContext::from_payload(payload)?,
            None => RecognitionContext::default(),
        };
        self.recognize_with(model, &context).await
    }

    pub async fn recognize_with(
        &self,
        model: Option<&str>,
        context: &RecognitionContext,
    ) -> Result<RankedCandidates> {
        let ink = self.seal();
        self.dispatcher.recognize(&ink, context, model).await
    }

    // ── Model lifecycle ─────────────────────────────────────────────────

    pub fn default_model(&self) -> &ModelHandle {
        self.dispatcher.default_model()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Download one model, streaming a banner and then one terminal event.
    ///
    /// # Errors
    /// `InvalidModel` before anything is dispatched.
    pub fn download_model(&self, tag: &str) -> Result<BatchStream> {
        let handle = self.registry.resolve(tag)?;
        let banner = format!("Processing singular model {}...", handle.language_tag());
        Ok(self.batches.run_with_banner(
            vec![handle.language_tag().to_string()],
            ModelOp::Download,
            banner,
        ))
    }

    pub fn download_models(&self, tags: Vec<String>) -> BatchStream {
        self.batches.run(tags, ModelOp::Download)
    }

    /// Delete one model and report the result as a single terminal event.
    pub async fn delete_model(&self, tag: &str) -> Result<BatchEvent> {
        let handle = self.registry.resolve(tag)?;
        self.registry.delete(&handle).await?;
        Ok(BatchEvent::succeeded(
            handle.language_tag(),
            format!("{} model deleted successfully.", handle.language_tag()),
            true,
        ))
    }

    pub fn delete_models(&self, tags: Vec<String>) -> BatchStream {
        self.batches.run(tags, ModelOp::Delete)
    }

    /// Delete every model downloaded at the time of the call.
    ///
    /// Models that finish downloading after the listing are not included.
    pub async fn delete_all_models(&self) -> Result<BatchStream> {
        let snapshot = self.registry.list_downloaded().await?;
        if snapshot.is_empty() {
            return Ok(BatchStream::single(BatchEvent::nothing_to_do(
                "No models are currently downloaded.",
            )));
        }
        let tags = snapshot
            .iter()
            .map(|id| id.language_tag().to_string())
            .collect();
        Ok(self
            .batches
            .run_with_banner(tags, ModelOp::Delete, "Deleting models...".into()))
    }

    pub async fn list_downloaded_models(&self) -> Result<BTreeSet<ModelIdentifier>> {
        self.registry.list_downloaded().await
    }

    // ── Observability ───────────────────────────────────────────────────

    /// Subscribe to model presence changes (downloads, failures, deletions).
    pub fn subscribe_model_events(&self) -> broadcast::Receiver<ModelStatusEvent> {
        self.registry.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Zero every counter, e.g. between benchmark runs.
    pub fn reset_diagnostics(&self) {
        self.diagnostics.reset();
    }
}

impl std::fmt::Debug for InkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InkSession")
            .field("config", &self.config)
            .field("pending_strokes", &self.pending_strokes())
            .finish_non_exhaustive()
    }
}
