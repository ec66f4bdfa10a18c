//! Point/stroke accumulator.
//!
//! Converts raw per-axis arrays into a `Stroke`. Input arrives as JSON values
//! from the host, so every element is checked: integers are widened to `f32`,
//! anything else that is not a finite number is rejected. Nothing is ever
//! truncated or zero-filled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InkError, Result};
use crate::ink::{Point, Stroke};

/// Raw `logStroke` payload as sent by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrokePayload {
    pub x: Vec<Value>,
    pub y: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<Vec<Value>>,
}

impl StrokePayload {
    /// Validate and coerce the payload into a finished stroke.
    pub fn to_stroke(&self) -> Result<Stroke> {
        let xs = coerce_axis("x", &self.x)?;
        let ys = coerce_axis("y", &self.y)?;
        let ts = self.t.as_deref().map(coerce_timestamps).transpose()?;
        build_stroke(&xs, &ys, ts.as_deref())
    }
}

/// Acknowledgement for one appended stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeAppended {
    /// Position of the stroke in the pending buffer.
    pub stroke_index: usize,
    pub point_count: usize,
    pub timed: bool,
}

impl StrokeAppended {
    pub fn message(&self) -> &'static str {
        if self.timed {
            "(with time values) stroke added"
        } else {
            "(without time values) stroke added"
        }
    }
}

/// Zip already-typed axes into a stroke.
///
/// # Errors
/// `MalformedInput` when the axes are empty, differ in length, `ts` has a
/// different length, or any coordinate is not finite.
pub fn build_stroke(xs: &[f32], ys: &[f32], ts: Option<&[i64]>) -> Result<Stroke> {
    if xs.is_empty() {
        return Err(InkError::MalformedInput("stroke has no points".into()));
    }
    if xs.len() != ys.len() {
        return Err(InkError::MalformedInput(format!(
            "x has {} values but y has {}",
            xs.len(),
            ys.len()
        )));
    }
    if let Some(ts) = ts {
        if ts.len() != xs.len() {
            return Err(InkError::MalformedInput(format!(
                "x has {} values but t has {}",
                xs.len(),
                ts.len()
            )));
        }
    }
    if let Some(i) = xs.iter().chain(ys).position(|v| !v.is_finite()) {
        let axis = if i < xs.len() { "x" } else { "y" };
        return Err(InkError::MalformedInput(format!(
            "{axis}[{}] is not finite",
            i % xs.len()
        )));
    }

    let points = match ts {
        Some(ts) => xs
            .iter()
            .zip(ys)
            .zip(ts)
            .map(|((&x, &y), &t)| Point::timed(x, y, t))
            .collect(),
        None => xs.iter().zip(ys).map(|(&x, &y)| Point::new(x, y)).collect(),
    };
    Ok(Stroke::from_points(points))
}

fn coerce_axis(axis: &str, values: &[Value]) -> Result<Vec<f32>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let n = v
                .as_f64()
                .ok_or_else(|| InkError::MalformedInput(format!("{axis}[{i}] is not a number")))?;
            let sample = n as f32;
            if !sample.is_finite() {
                return Err(InkError::MalformedInput(format!(
                    "{axis}[{i}] is out of range"
                )));
            }
            Ok(sample)
        })
        .collect()
}

fn coerce_timestamps(values: &[Value]) -> Result<Vec<i64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if let Some(t) = v.as_i64() {
                return Ok(t);
            }
            // Whole-valued floats (e.g. `1200.0` from a JS Date) are accepted.
            match v.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(InkError::MalformedInput(format!(
                    "t[{i}] is not an integer timestamp"
                ))),
            }
        })
        .collect()
}
