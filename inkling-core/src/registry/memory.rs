//! `MemoryModelStore`: in-process model store with simulated transfers.
//!
//! Stands in for the platform model manager in the host binary and tests.
//! Validation is a case-insensitive lookup in a fixed catalog; "downloaded"
//! is a set in memory. Latency, per-model transfer failures and a global
//! offline switch can be injected.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{InkError, Result};
use crate::registry::{ModelIdentifier, ModelStore};

/// Language tags supported out of the box.
pub const DEFAULT_CATALOG: &[&str] = &[
    "en-US",
    "en-GB",
    "fr-FR",
    "de-DE",
    "es-ES",
    "it-IT",
    "pt-BR",
    "nl-NL",
    "pl-PL",
    "ru",
    "uk",
    "ja",
    "ko",
    "zh-Hani",
    "ar",
    "hi",
    "zxx-Zsye-x-emoji",
    "zxx-Zsym-x-autodraw",
];

pub struct MemoryModelStore {
    catalog: Vec<String>,
    downloaded: Mutex<BTreeSet<ModelIdentifier>>,
    failing: Mutex<HashSet<String>>,
    latency: Duration,
    offline: AtomicBool,
    transfers: AtomicUsize,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.iter().map(|s| s.to_string()).collect(),
            downloaded: Mutex::new(BTreeSet::new()),
            failing: Mutex::new(HashSet::new()),
            latency: Duration::ZERO,
            offline: AtomicBool::new(false),
            transfers: AtomicUsize::new(0),
        }
    }

    /// Replace the supported catalog. Blank entries are ignored.
    pub fn with_catalog<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.catalog = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Mark models as already present. Tags outside the catalog are skipped.
    pub fn with_downloaded<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut downloaded = self.downloaded.lock();
            for tag in tags {
                if let Some(id) = self.validate(tag.as_ref()) {
                    downloaded.insert(id);
                }
            }
        }
        self
    }

    /// Simulated duration of each transfer and deletion.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Transfers of these models will fail with `StoreUnavailable`.
    pub fn with_failing_downloads<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.failing
            .lock()
            .extend(tags.into_iter().map(|t| t.as_ref().to_ascii_lowercase()));
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of transfers started since construction.
    pub fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(InkError::StoreUnavailable("model store is offline".into()));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MemoryModelStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelStore for MemoryModelStore {
    fn validate(&self, tag: &str) -> Option<ModelIdentifier> {
        self.catalog
            .iter()
            .find(|known| known.eq_ignore_ascii_case(tag))
            .map(|known| ModelIdentifier::new(known.as_str()))
    }

    async fn is_downloaded(&self, model: &ModelIdentifier) -> Result<bool> {
        self.ensure_online()?;
        Ok(self.downloaded.lock().contains(model))
    }

    async fn download(&self, model: &ModelIdentifier) -> Result<()> {
        self.ensure_online()?;
        self.transfers.fetch_add(1, Ordering::SeqCst);
        debug!(model = %model, "simulated transfer started");
        self.simulate_latency().await;

        let tag = model.language_tag().to_ascii_lowercase();
        if self.failing.lock().contains(&tag) {
            return Err(InkError::StoreUnavailable(format!(
                "transfer of {model} failed"
            )));
        }
        self.downloaded.lock().insert(model.clone());
        Ok(())
    }

    async fn delete(&self, model: &ModelIdentifier) -> Result<()> {
        self.ensure_online()?;
        self.simulate_latency().await;
        if !self.downloaded.lock().remove(model) {
            return Err(InkError::NotDownloaded {
                tag: model.language_tag().to_string(),
            });
        }
        Ok(())
    }

    async fn list_downloaded(&self) -> Result<BTreeSet<ModelIdentifier>> {
        self.ensure_online()?;
        Ok(self.downloaded.lock().clone())
    }
}
