//! Ink data model and the pending stroke buffer.
//!
//! ```text
//! StrokePayload ──accumulator──► Stroke ──append──► InkBuffer ──seal──► Ink
//! ```
//!
//! Strokes are immutable once built. `InkBuffer` is append-only until
//! `reset()`; `seal()` takes a snapshot without clearing, so a caller can
//! retry recognition without re-entering strokes.

pub mod accumulator;

use serde::{Deserialize, Serialize};

pub use accumulator::{StrokeAppended, StrokePayload};

/// One pen sample. `t` is a caller-defined timestamp (usually milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, t: None }
    }

    pub fn timed(x: f32, y: f32, t: i64) -> Self {
        Self { x, y, t: Some(t) }
    }
}

/// One pen-down to pen-up sequence.
///
/// Only constructed through the accumulator, which guarantees the stroke is
/// non-empty and that either every point carries `t` or none does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    pub(crate) fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_timestamps(&self) -> bool {
        self.points.first().is_some_and(|p| p.t.is_some())
    }
}

/// Immutable, sealed handwriting sample handed to the recognizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ink {
    strokes: Vec<Stroke>,
}

impl Ink {
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }
}

/// Pending, append-only stroke buffer owned by one session.
#[derive(Debug, Default)]
pub struct InkBuffer {
    strokes: Vec<Stroke>,
}

impl InkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished stroke, returning its index in the buffer.
    pub fn append(&mut self, stroke: Stroke) -> usize {
        self.strokes.push(stroke);
        self.strokes.len() - 1
    }

    /// Discard every pending stroke.
    pub fn reset(&mut self) {
        self.strokes = Vec::new();
    }

    /// Snapshot of all strokes since the last reset. Leaves the buffer intact.
    pub fn seal(&self) -> Ink {
        Ink {
            strokes: self.strokes.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}
