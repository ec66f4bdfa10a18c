//! Session counters for observability.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct SessionDiagnostics {
    pub strokes_logged: AtomicUsize,
    pub recognitions: AtomicUsize,
    pub recognition_errors: AtomicUsize,
    /// Transfers actually handed to the model store.
    pub transfers_started: AtomicUsize,
    /// Download requests that joined a transfer already in flight.
    pub transfers_joined: AtomicUsize,
    pub deletions: AtomicUsize,
    pub batches_run: AtomicUsize,
}

impl SessionDiagnostics {
    pub fn reset(&self) {
        self.strokes_logged.store(0, Ordering::Relaxed);
        self.recognitions.store(0, Ordering::Relaxed);
        self.recognition_errors.store(0, Ordering::Relaxed);
        self.transfers_started.store(0, Ordering::Relaxed);
        self.transfers_joined.store(0, Ordering::Relaxed);
        self.deletions.store(0, Ordering::Relaxed);
        self.batches_run.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            strokes_logged: self.strokes_logged.load(Ordering::Relaxed),
            recognitions: self.recognitions.load(Ordering::Relaxed),
            recognition_errors: self.recognition_errors.load(Ordering::Relaxed),
            transfers_started: self.transfers_started.load(Ordering::Relaxed),
            transfers_joined: self.transfers_joined.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            batches_run: self.batches_run.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub strokes_logged: usize,
    pub recognitions: usize,
    pub recognition_errors: usize,
    pub transfers_started: usize,
    pub transfers_joined: usize,
    pub deletions: usize,
    pub batches_run: usize,
}
