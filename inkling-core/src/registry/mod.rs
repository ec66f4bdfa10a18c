//! Model registry: language tags → model handles, and on-device presence.
//!
//! The `ModelStore` trait is the seam to the platform model manager (ML Kit
//! remote model manager, a local directory of weights, ...). The registry
//! adds the policy on top of it:
//!
//! - validation failures become `InvalidModel`, never a panic
//! - presence is re-queried on every check, nothing is cached
//! - `download` is idempotent and runs at most one transfer per identifier
//! - `delete` of an absent model is a reported `NotDownloaded`
//!
//! ## In-flight transfers
//!
//! ```text
//! download(en-US) ──lock──► table has en-US? ──yes──► clone watch::Receiver, await
//!                                  │
//!                                  no
//!                                  ▼
//!                     insert receiver, spawn transfer task
//!                                  │
//!            transfer task: is_downloaded → download → lock, remove, publish
//! ```
//!
//! The transfer runs on its own task so it completes even if every caller
//! stops waiting; the table entry is removed in the same critical section
//! that publishes the outcome.

pub mod memory;

pub use memory::MemoryModelStore;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::diagnostics::SessionDiagnostics;
use crate::error::{InkError, Result};
use crate::ipc::events::{ModelStatus, ModelStatusEvent};

/// A language tag the model store has accepted (e.g. `"en-US"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelIdentifier(String);

impl ModelIdentifier {
    /// Only model stores should mint identifiers; callers go through
    /// `ModelRegistry::resolve`.
    pub fn new(language_tag: impl Into<String>) -> Self {
        Self(language_tag.into())
    }

    pub fn language_tag(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-device presence as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresenceState {
    Unknown,
    Downloaded,
    NotDownloaded,
    Downloading,
}

/// Short-lived reference to one model. The store stays the source of truth;
/// `presence` is only what was observed when the handle was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub identifier: ModelIdentifier,
    pub presence: PresenceState,
}

impl ModelHandle {
    pub fn new(identifier: ModelIdentifier) -> Self {
        Self {
            identifier,
            presence: PresenceState::Unknown,
        }
    }

    pub fn language_tag(&self) -> &str {
        self.identifier.language_tag()
    }
}

/// Result of a successful `download`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Already on device; no transfer was started.
    AlreadyDownloaded,
    /// A transfer ran and finished.
    Downloaded,
}

/// Contract for platform model managers.
///
/// Every async method may fail with `InkError::StoreUnavailable`.
#[async_trait]
pub trait ModelStore: Send + Sync + 'static {
    /// Map a language tag to a model identifier, or `None` when the store has
    /// no such model. Must not touch the network.
    fn validate(&self, tag: &str) -> Option<ModelIdentifier>;

    async fn is_downloaded(&self, model: &ModelIdentifier) -> Result<bool>;

    /// Fetch the model onto the device.
    async fn download(&self, model: &ModelIdentifier) -> Result<()>;

    /// Remove the model from the device.
    async fn delete(&self, model: &ModelIdentifier) -> Result<()>;

    async fn list_downloaded(&self) -> Result<BTreeSet<ModelIdentifier>>;
}

type TransferResult = std::result::Result<DownloadOutcome, InkError>;
type TransferTable = HashMap<ModelIdentifier, watch::Receiver<Option<TransferResult>>>;

pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    in_flight: Arc<Mutex<TransferTable>>,
    status_tx: broadcast::Sender<ModelStatusEvent>,
    diagnostics: Arc<SessionDiagnostics>,
}

impl ModelRegistry {
    pub fn new(
        store: Arc<dyn ModelStore>,
        status_tx: broadcast::Sender<ModelStatusEvent>,
        diagnostics: Arc<SessionDiagnostics>,
    ) -> Self {
        Self {
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            status_tx,
            diagnostics,
        }
    }

    /// Validate a language tag and build a handle for it.
    ///
    /// # Errors
    /// `InvalidModel` if the tag is blank or unknown to the store.
    pub fn resolve(&self, language_tag: &str) -> Result<ModelHandle> {
        let tag = language_tag.trim();
        if tag.is_empty() {
            return Err(InkError::InvalidModel {
                tag: language_tag.to_string(),
            });
        }
        self.store
            .validate(tag)
            .map(ModelHandle::new)
            .ok_or_else(|| InkError::InvalidModel {
                tag: tag.to_string(),
            })
    }

    pub async fn is_downloaded(&self, handle: &ModelHandle) -> Result<bool> {
        self.store.is_downloaded(&handle.identifier).await
    }

    /// Current presence, reporting `Downloading` while a transfer is in flight.
    pub async fn presence(&self, handle: &ModelHandle) -> Result<PresenceState> {
        if self.in_flight.lock().contains_key(&handle.identifier) {
            return Ok(PresenceState::Downloading);
        }
        Ok(if self.is_downloaded(handle).await? {
            PresenceState::Downloaded
        } else {
            PresenceState::NotDownloaded
        })
    }

    /// Ensure the model is on device.
    ///
    /// Concurrent calls for the same identifier share one transfer and all
    /// observe the same outcome. Must be called from within a Tokio runtime.
    pub async fn download(&self, handle: &ModelHandle) -> Result<DownloadOutcome> {
        let id = handle.identifier.clone();
        let mut rx = {
            let mut table = self.in_flight.lock();
            match table.get(&id) {
                Some(rx) => {
                    SessionDiagnostics::bump(&self.diagnostics.transfers_joined);
                    debug!(model = %id, "joining in-flight download");
                    rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    table.insert(id.clone(), rx.clone());
                    self.spawn_transfer(id.clone(), tx);
                    rx
                }
            }
        };

        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| {
                InkError::StoreUnavailable(format!("download of {id} ended without a result"))
            })?
            .clone();
        settled.unwrap_or_else(|| {
            Err(InkError::StoreUnavailable(format!(
                "download of {id} ended without a result"
            )))
        })
    }

    /// Remove a model from the device.
    ///
    /// # Errors
    /// `NotDownloaded` if the store does not report the model as present.
    pub async fn delete(&self, handle: &ModelHandle) -> Result<()> {
        let id = &handle.identifier;
        if !self.store.is_downloaded(id).await? {
            return Err(InkError::NotDownloaded {
                tag: id.language_tag().to_string(),
            });
        }
        self.store.delete(id).await?;
        SessionDiagnostics::bump(&self.diagnostics.deletions);
        info!(model = %id, "model deleted");
        let _ = self.status_tx.send(ModelStatusEvent {
            model: id.language_tag().to_string(),
            status: ModelStatus::Deleted,
            detail: None,
        });
        Ok(())
    }

    pub async fn list_downloaded(&self) -> Result<BTreeSet<ModelIdentifier>> {
        self.store.list_downloaded().await
    }

    /// Number of transfers currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelStatusEvent> {
        self.status_tx.subscribe()
    }

    fn spawn_transfer(&self, id: ModelIdentifier, tx: watch::Sender<Option<TransferResult>>) {
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let status_tx = self.status_tx.clone();
        let diagnostics = Arc::clone(&self.diagnostics);

        tokio::spawn(async move {
            let result = transfer(store.as_ref(), &id, &status_tx, &diagnostics).await;
            let mut table = in_flight.lock();
            table.remove(&id);
            tx.send_replace(Some(result));
        });
    }
}

async fn transfer(
    store: &dyn ModelStore,
    id: &ModelIdentifier,
    status_tx: &broadcast::Sender<ModelStatusEvent>,
    diagnostics: &SessionDiagnostics,
) -> TransferResult {
    if store.is_downloaded(id).await? {
        debug!(model = %id, "model already downloaded, skipping transfer");
        return Ok(DownloadOutcome::AlreadyDownloaded);
    }

    SessionDiagnostics::bump(&diagnostics.transfers_started);
    info!(model = %id, "model download started");
    let _ = status_tx.send(ModelStatusEvent {
        model: id.language_tag().to_string(),
        status: ModelStatus::Downloading,
        detail: None,
    });

    match store.download(id).await {
        Ok(()) => {
            info!(model = %id, "model download finished");
            let _ = status_tx.send(ModelStatusEvent {
                model: id.language_tag().to_string(),
                status: ModelStatus::Downloaded,
                detail: None,
            });
            Ok(DownloadOutcome::Downloaded)
        }
        Err(e) => {
            warn!(model = %id, error = %e, "model download failed");
            let _ = status_tx.send(ModelStatusEvent {
                model: id.language_tag().to_string(),
                status: ModelStatus::DownloadFailed,
                detail: Some(e.to_string()),
            });
            Err(e)
        }
    }
}
