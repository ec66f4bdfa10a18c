//! Recognition context builder.
//!
//! A context carries the text already written before the ink (pre-context)
//! and the size of the writing surface. Both bias the recognizer, so a
//! malformed hint is an error rather than a silent fallback to defaults.
//!
//! Accepted host payloads:
//!
//! | Shape | Example |
//! |-------|---------|
//! | text only | `"hello "` |
//! | tuple | `["hello ", [320, 80]]` |
//! | object | `{"text": "hello ", "writingArea": {"w": 320, "h": 80}}` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InkError, Result};

/// Writing surface dimensions, in the same units as the stroke coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WritingArea {
    pub width: f32,
    pub height: f32,
}

impl WritingArea {
    pub fn new(width: f32, height: f32) -> Result<Self> {
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return Err(InkError::MalformedContext(format!(
                "writing area must be two non-negative numbers, got ({width}, {height})"
            )));
        }
        Ok(Self { width, height })
    }
}

/// Per-request recognition hints. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionContext {
    pub pre_text: String,
    pub writing_area: WritingArea,
}

impl RecognitionContext {
    /// Assemble a context from typed parts; `None` means "use the default".
    pub fn build(pre_text: Option<&str>, surface: Option<(f32, f32)>) -> Result<Self> {
        let writing_area = match surface {
            Some((w, h)) => WritingArea::new(w, h)?,
            None => WritingArea::default(),
        };
        Ok(Self {
            pre_text: pre_text.unwrap_or_default().to_string(),
            writing_area,
        })
    }

    /// Parse a raw host payload. `null` yields the default context.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        match payload {
            Value::Null => Ok(Self::default()),
            Value::String(text) => Self::build(Some(text), None),
            Value::Array(parts) => {
                if parts.is_empty() || parts.len() > 2 {
                    return Err(InkError::MalformedContext(format!(
                        "expected [text, [w, h]], got {} elements",
                        parts.len()
                    )));
                }
                let text = text_of(&parts[0])?;
                let surface = parts.get(1).map(dims_of).transpose()?.flatten();
                Self::build(text, surface)
            }
            Value::Object(map) => {
                let unknown = map
                    .keys()
                    .find(|k| !matches!(k.as_str(), "text" | "writingArea"));
                if let Some(key) = unknown {
                    return Err(InkError::MalformedContext(format!(
                        "unknown context field `{key}`"
                    )));
                }
                let text = map.get("text").map(text_of).transpose()?.flatten();
                let surface = map.get("writingArea").map(dims_of).transpose()?.flatten();
                Self::build(text, surface)
            }
            other => Err(InkError::MalformedContext(format!(
                "unsupported context payload: {other}"
            ))),
        }
    }
}

fn text_of(value: &Value) -> Result<Option<&str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.as_str())),
        other => Err(InkError::MalformedContext(format!(
            "pre-context must be a string, got {other}"
        ))),
    }
}

fn dims_of(value: &Value) -> Result<Option<(f32, f32)>> {
    let pair = match value {
        Value::Null => return Ok(None),
        Value::Array(items) if items.len() == 2 => (&items[0], &items[1]),
        Value::Object(map) => match (map.get("w"), map.get("h")) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                return Err(InkError::MalformedContext(
                    "writing area object needs both w and h".into(),
                ))
            }
        },
        other => {
            return Err(InkError::MalformedContext(format!(
                "writing area must be a [w, h] pair, got {other}"
            )))
        }
    };
    match (pair.0.as_f64(), pair.1.as_f64()) {
        (Some(w), Some(h)) => Ok(Some((w as f32, h as f32))),
        _ => Err(InkError::MalformedContext(
            "writing area dimensions must be numeric".into(),
        )),
    }
}
