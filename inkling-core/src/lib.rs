//! # inkling-core
//!
//! Reusable digital-ink session engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! logStroke ─► accumulator ─► InkBuffer ──seal──► Ink
//!                                                  │
//!                          RecognitionContext ─────┤
//!                                                  ▼
//!                     RecognitionDispatcher ─► ModelRegistry::is_downloaded
//!                                                  │
//!                                          Recognizer::recognize
//!
//! download / delete ─► BatchCoordinator ─► ModelRegistry ─► ModelStore
//!                             │
//!                       BatchStream (mpsc)          broadcast<ModelStatusEvent>
//! ```
//!
//! The recognizer and the model store are external capabilities behind
//! traits; `inference::stub` and `registry::memory` provide in-process
//! stand-ins.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod batch;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod inference;
pub mod ink;
pub mod ipc;
pub mod registry;
pub mod session;

// Convenience re-exports for downstream crates
pub use batch::{BatchStream, ModelOp};
pub use context::{RecognitionContext, WritingArea};
pub use error::{ErrorKind, InkError};
pub use inference::{Candidate, RankedCandidates, Recognizer};
pub use ink::{Ink, Point, Stroke, StrokePayload};
pub use ipc::events::{BatchEvent, ModelStatus, ModelStatusEvent};
pub use ipc::request::Request;
pub use registry::{ModelHandle, ModelIdentifier, ModelStore, PresenceState};
pub use session::{InkSession, Reply, SessionConfig};
