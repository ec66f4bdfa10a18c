//! JSON-lines transport.
//!
//! One request per input line, e.g. `{"id": 7, "op": "recognize"}`. Every
//! reply line echoes the request `id`. Streamed model batches write one line
//! per `BatchEvent` as it arrives, so lines from different batches may
//! interleave; the `id` and `item` fields tell them apart. Model status
//! broadcasts are written as `{"event": "modelStatus", ...}`.
//!
//! Requests are handled one at a time, which keeps stroke logging serialised.

use std::sync::Arc;

use anyhow::Context;
use inkling_core::ipc::events::ErrorResponse;
use inkling_core::{InkError, InkSession, Reply, Request};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Split a request line into its correlation id and the request itself.
///
/// The id is taken before the request is decoded, so a request that fails to
/// decode is still answered under its own id.
fn parse_line(line: &str) -> (Option<Value>, Result<Request, InkError>) {
    let mut value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(e) => {
            return (
                None,
                Err(InkError::MalformedInput(format!("request is not JSON: {e}"))),
            )
        }
    };
    let id = value
        .as_object_mut()
        .and_then(|map| map.remove("id"))
        .filter(|id| !id.is_null());
    let request = Request::deserialize(value)
        .map_err(|e| InkError::MalformedInput(format!("invalid request: {e}")));
    (id, request)
}

/// Serve requests from `input` until EOF, then wait for open batches to
/// finish. Returns the writer once everything has been flushed.
pub async fn serve<R, W>(session: Arc<InkSession>, input: R, output: W) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(write_lines(out_rx, output));
    let status_forwarder = tokio::spawn(forward_status(
        session.subscribe_model_events(),
        out_tx.clone(),
    ));
    let mut batches = JoinSet::new();

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("reading request line")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (id, request) = parse_line(line);
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                let _ = out_tx.send(error_line(&e, id.as_ref()));
                continue;
            }
        };

        let op = request.name();
        match session.handle(request).await {
            Ok(Reply::Stream(mut stream)) => {
                let out_tx = out_tx.clone();
                batches.spawn(async move {
                    while let Some(event) = stream.next().await {
                        match serde_json::to_value(&event) {
                            Ok(value) => {
                                let _ = out_tx.send(with_id(value, id.as_ref()));
                            }
                            Err(e) => warn!(error = %e, "failed to encode batch event"),
                        }
                    }
                });
            }
            Ok(reply) => {
                if let Some(value) = reply.to_json() {
                    let _ = out_tx.send(with_id(value, id.as_ref()));
                }
            }
            Err(e) => {
                debug!(op, error = %e, "request failed");
                let _ = out_tx.send(error_line(&e, id.as_ref()));
            }
        }
    }

    info!("input closed, waiting for open batches");
    while batches.join_next().await.is_some() {}
    status_forwarder.abort();
    drop(out_tx);

    writer.await.context("writer task panicked")?
}

async fn write_lines<W>(mut rx: mpsc::UnboundedReceiver<Value>, mut output: W) -> anyhow::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(value) = rx.recv().await {
        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(output)
}

async fn forward_status(
    mut rx: broadcast::Receiver<inkling_core::ModelStatusEvent>,
    out_tx: mpsc::UnboundedSender<Value>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Ok(Value::Object(mut map)) = serde_json::to_value(&event) {
                    map.insert("event".into(), Value::from("modelStatus"));
                    if out_tx.send(Value::Object(map)).is_err() {
                        return;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "model status listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn error_line(err: &InkError, id: Option<&Value>) -> Value {
    let value = serde_json::to_value(ErrorResponse::from(err)).unwrap_or(Value::Null);
    with_id(value, id)
}

fn with_id(mut value: Value, id: Option<&Value>) -> Value {
    if let (Some(id), Value::Object(map)) = (id, &mut value) {
        map.insert("id".into(), id.clone());
    }
    value
}
