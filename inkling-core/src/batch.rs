//! Batch lifecycle coordinator.
//!
//! Runs one model operation over many language tags concurrently and streams
//! one `BatchEvent` per item over an unbounded channel:
//!
//! ```text
//! run(["en-US", "fr-FR"], Download)
//!   ├─► banner        {ok, done: false, item: None}
//!   ├─► spawn item 0 ─┐
//!   └─► spawn item 1 ─┤  each task: resolve → registry op → tracker.report()
//!                     ▼
//!          tracker (mutex): completed += 1; done = completed == total; send
//! ```
//!
//! Counting and sending happen under the same lock, so the `done` event is
//! always the last one on the channel. The channel closes once every item
//! task has dropped its tracker reference. Failed items never stop the
//! others.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::diagnostics::SessionDiagnostics;
use crate::error::Result;
use crate::ipc::events::BatchEvent;
use crate::registry::{DownloadOutcome, ModelRegistry};

/// Operation applied to every item of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOp {
    Download,
    Delete,
}

/// Receiving end of a batch. Yields events until the batch is complete.
#[derive(Debug)]
pub struct BatchStream {
    rx: mpsc::UnboundedReceiver<BatchEvent>,
}

impl BatchStream {
    /// A stream that yields exactly `event` and then closes.
    pub fn single(event: BatchEvent) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(event);
        Self { rx }
    }

    /// Next event, or `None` once the batch is complete.
    pub async fn next(&mut self) -> Option<BatchEvent> {
        self.rx.recv().await
    }

    /// Drain the whole batch.
    pub async fn collect(mut self) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

struct CompletionTracker {
    completed: usize,
    total: usize,
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl CompletionTracker {
    fn report(&mut self, item: String, outcome: Result<String>) {
        self.completed += 1;
        let done = self.completed == self.total;
        let event = match outcome {
            Ok(message) => BatchEvent::succeeded(item, message, done),
            Err(e) => BatchEvent::failed(item, &e, done),
        };
        if self.tx.send(event).is_err() {
            debug!("batch listener dropped, item outcome discarded");
        }
    }
}

pub struct BatchCoordinator {
    registry: Arc<ModelRegistry>,
    diagnostics: Arc<SessionDiagnostics>,
}

impl BatchCoordinator {
    pub fn new(registry: Arc<ModelRegistry>, diagnostics: Arc<SessionDiagnostics>) -> Self {
        Self {
            registry,
            diagnostics,
        }
    }

    /// Run `op` over `items` with the default banner text.
    pub fn run(&self, items: Vec<String>, op: ModelOp) -> BatchStream {
        let banner = match items.as_slice() {
            [only] => {
                let label = self
                    .registry
                    .resolve(only)
                    .map(|handle| handle.language_tag().to_string())
                    .unwrap_or_else(|_| only.clone());
                format!("Processing model {label}...")
            }
            _ => format!("Processing {} models...", items.len()),
        };
        self.run_with_banner(items, op, banner)
    }

    /// Run `op` over `items`, announcing the batch with `banner`.
    ///
    /// Returns immediately; items are processed on spawned tasks.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn run_with_banner(&self, items: Vec<String>, op: ModelOp, banner: String) -> BatchStream {
        let (tx, rx) = mpsc::unbounded_channel();

        if items.is_empty() {
            let _ = tx.send(BatchEvent::nothing_to_do("No models to process."));
            return BatchStream { rx };
        }

        SessionDiagnostics::bump(&self.diagnostics.batches_run);
        info!(?op, items = items.len(), "batch started");
        let _ = tx.send(BatchEvent::started(banner));

        let tracker = Arc::new(Mutex::new(CompletionTracker {
            completed: 0,
            total: items.len(),
            tx,
        }));

        for tag in items {
            let registry = Arc::clone(&self.registry);
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                let (item, outcome) = run_item(&registry, tag, op).await;
                tracker.lock().report(item, outcome);
            });
        }

        BatchStream { rx }
    }
}

/// Run one item. Returns the label to report (canonical tag when the item
/// resolved) and the success message or error.
async fn run_item(registry: &ModelRegistry, tag: String, op: ModelOp) -> (String, Result<String>) {
    let handle = match registry.resolve(&tag) {
        Ok(handle) => handle,
        Err(e) => return (tag, Err(e)),
    };
    let label = handle.language_tag().to_string();

    let outcome = match op {
        ModelOp::Download => registry.download(&handle).await.map(|outcome| match outcome {
            DownloadOutcome::AlreadyDownloaded => format!("{label} model is already downloaded."),
            DownloadOutcome::Downloaded => format!("{label} model was downloaded successfully."),
        }),
        ModelOp::Delete => registry
            .delete(&handle)
            .await
            .map(|()| format!("{label} model deleted successfully.")),
    };
    (label, outcome)
}
