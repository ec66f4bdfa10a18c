use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use async_trait::async_trait;
use inkling_core::inference::stub::StubRecognizer;
use inkling_core::registry::MemoryModelStore;
use inkling_core::{
    BatchEvent, Candidate, ErrorKind, Ink, InkError, InkSession, ModelIdentifier, ModelStatus,
    ModelStore, RecognitionContext, Recognizer, Reply, Request, SessionConfig, StrokePayload,
};
use parking_lot::Mutex;
use serde_json::json;

fn session_with(store: Arc<dyn ModelStore>, recognizer: Arc<StubRecognizer>) -> InkSession {
    InkSession::new(SessionConfig::default(), store, recognizer).expect("session")
}

fn payload(value: serde_json::Value) -> StrokePayload {
    serde_json::from_value(value).expect("stroke payload")
}

/// Store whose transfers take a per-model amount of time, to force
/// completion order to differ from submission order.
struct StaggeredStore {
    inner: MemoryModelStore,
    delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
}

#[async_trait]
impl ModelStore for StaggeredStore {
    fn validate(&self, tag: &str) -> Option<ModelIdentifier> {
        self.inner.validate(tag)
    }

    async fn is_downloaded(&self, model: &ModelIdentifier) -> Result<bool, InkError> {
        self.inner.is_downloaded(model).await
    }

    async fn download(&self, model: &ModelIdentifier) -> Result<(), InkError> {
        if let Some(delay) = self.delays.get(model.language_tag()) {
            tokio::time::sleep(*delay).await;
        }
        let result = self.inner.download(model).await;
        self.completed.lock().push(model.language_tag().to_string());
        result
    }

    async fn delete(&self, model: &ModelIdentifier) -> Result<(), InkError> {
        self.inner.delete(model).await
    }

    async fn list_downloaded(&self) -> Result<BTreeSet<ModelIdentifier>, InkError> {
        self.inner.list_downloaded().await
    }
}

#[tokio::test]
async fn logged_stroke_is_sealed_in_order() {
    let session = session_with(
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    );

    session
        .log_stroke(&payload(json!({ "x": [9, 9], "y": [9, 9] })))
        .expect("first stroke");
    let ack = session
        .log_stroke(&payload(json!({ "x": [3, 1.5, 2], "y": [0, 7, 4], "t": [10, 20, 30] })))
        .expect("second stroke");
    assert_eq!(ack.stroke_index, 1);
    assert!(ack.timed);

    let ink = session.seal();
    let last = ink.strokes().last().expect("last stroke");
    let xs: Vec<f32> = last.points().iter().map(|p| p.x).collect();
    let ys: Vec<f32> = last.points().iter().map(|p| p.y).collect();
    let ts: Vec<Option<i64>> = last.points().iter().map(|p| p.t).collect();
    assert_eq!(xs, vec![3.0, 1.5, 2.0]);
    assert_eq!(ys, vec![0.0, 7.0, 4.0]);
    assert_eq!(ts, vec![Some(10), Some(20), Some(30)]);

    // Seal does not clear.
    assert_eq!(session.seal().strokes().len(), 2);
}

#[tokio::test]
async fn erase_then_seal_is_empty() {
    let session = session_with(
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    );
    session
        .log_points(&[0.0, 1.0], &[0.0, 1.0], None)
        .expect("stroke");
    session.erase();
    assert!(session.seal().is_empty());
}

#[tokio::test]
async fn malformed_stroke_leaves_buffer_untouched() {
    let session = session_with(
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    );
    let err = session
        .log_stroke(&payload(json!({ "x": [0, 1, 2], "y": [0, 1] })))
        .expect_err("mismatched axes");
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert_eq!(session.pending_strokes(), 0);
}

#[tokio::test]
async fn recognize_default_model_preserves_recognizer_order() {
    let scripted = vec![
        Candidate::new("zeta", 3.0),
        Candidate::new("alpha", 0.1),
        Candidate::new("mu", 9.5),
    ];
    let recognizer = Arc::new(StubRecognizer::scripted(scripted));
    let session = session_with(
        Arc::new(MemoryModelStore::new().with_downloaded(["en-US"])),
        recognizer.clone(),
    );

    session
        .log_stroke(&payload(json!({ "x": [0, 1, 2], "y": [0, 1, 0] })))
        .expect("stroke");
    let ranked = session.recognize(None, None).await.expect("recognize");

    assert_eq!(ranked.model.language_tag(), "en-US");
    assert_eq!(ranked.texts(), vec!["zeta", "alpha", "mu"]);
    let results = ranked.to_results();
    assert_relative_eq!(results.scores[1], 0.1);

    let request = recognizer.last_request().expect("recognizer called");
    assert_eq!(request.stroke_count, 1);
    assert_eq!(request.context.pre_text, "");
}

#[tokio::test]
async fn recognize_passes_context_to_recognizer() {
    let recognizer = Arc::new(StubRecognizer::new());
    let session = session_with(
        Arc::new(MemoryModelStore::new().with_downloaded(["en-US"])),
        recognizer.clone(),
    );
    session
        .log_points(&[0.0, 4.0], &[0.0, 4.0], None)
        .expect("stroke");

    let ranked = session
        .recognize(Some(""), Some(&json!(["hello ", [640, 120]])))
        .await
        .expect("recognize with context");

    assert!(!ranked.is_empty());
    assert_eq!(ranked.best().expect("best").text, "hello 1 strokes");
    let request = recognizer.last_request().expect("recognizer called");
    assert_relative_eq!(request.context.writing_area.width, 640.0);
}

#[tokio::test]
async fn recognize_against_missing_model_never_falls_back() {
    let recognizer = Arc::new(StubRecognizer::new());
    let store = Arc::new(MemoryModelStore::new().with_downloaded(["en-US"]));
    let session = session_with(store.clone(), recognizer.clone());
    session
        .log_points(&[0.0, 1.0], &[0.0, 1.0], None)
        .expect("stroke");

    let err = session
        .recognize(Some("fr-FR"), None)
        .await
        .expect_err("fr-FR is not downloaded");
    assert_eq!(
        err,
        InkError::ModelNotReady {
            tag: "fr-FR".into()
        }
    );
    assert!(recognizer.last_request().is_none());
    assert_eq!(store.transfer_count(), 0);
    assert_eq!(session.default_model().language_tag(), "en-US");
}

#[tokio::test]
async fn recognize_reports_input_errors_before_touching_the_store() {
    let store = Arc::new(MemoryModelStore::new());
    store.set_offline(true);
    let session = session_with(store, Arc::new(StubRecognizer::new()));

    let err = session
        .recognize(Some("klingon"), None)
        .await
        .expect_err("invalid tag");
    assert_eq!(err.kind(), ErrorKind::InvalidModel);

    let err = session
        .recognize(None, Some(&json!(["x", [1]])))
        .await
        .expect_err("bad context");
    assert_eq!(err.kind(), ErrorKind::MalformedContext);

    let err = session.recognize(None, None).await.expect_err("offline");
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
}

#[tokio::test]
async fn recognizer_failure_is_recognition_failed() {
    let session = session_with(
        Arc::new(MemoryModelStore::new().with_downloaded(["en-US"])),
        Arc::new(StubRecognizer::failing("model crashed")),
    );
    session
        .log_points(&[0.0], &[0.0], Some(&[5][..]))
        .expect("stroke");

    let err = session.recognize(None, None).await.expect_err("failure");
    assert_eq!(err, InkError::RecognitionFailed("model crashed".into()));
    assert_eq!(session.diagnostics_snapshot().recognition_errors, 1);
}

/// Recognizer that always fails with a store error.
struct OfflineRecognizer;

#[async_trait]
impl Recognizer for OfflineRecognizer {
    async fn recognize(
        &self,
        _ink: &Ink,
        _context: &RecognitionContext,
        _model: &ModelIdentifier,
    ) -> Result<Vec<Candidate>, InkError> {
        Err(InkError::StoreUnavailable("backend offline".into()))
    }
}

#[tokio::test]
async fn foreign_recognizer_errors_keep_only_their_detail() {
    let session = InkSession::new(
        SessionConfig::default(),
        Arc::new(MemoryModelStore::new().with_downloaded(["en-US"])),
        Arc::new(OfflineRecognizer),
    )
    .expect("session");
    session
        .log_points(&[0.0, 1.0], &[0.0, 1.0], None)
        .expect("stroke");

    let err = session.recognize(None, None).await.expect_err("failure");
    assert_eq!(err, InkError::RecognitionFailed("backend offline".into()));
    assert_eq!(err.to_string(), "recognition failed: backend offline");
}

#[tokio::test]
async fn diagnostics_count_activity_and_reset() {
    let store = Arc::new(MemoryModelStore::new().with_latency(Duration::from_millis(20)));
    let session = session_with(store, Arc::new(StubRecognizer::new()));

    session
        .log_points(&[0.0, 1.0], &[0.0, 1.0], None)
        .expect("stroke");
    let handle = session.registry().resolve("uk").expect("valid");
    let (a, b) = tokio::join!(
        session.registry().download(&handle),
        session.registry().download(&handle)
    );
    assert!(a.is_ok() && b.is_ok());
    session.delete_models(vec!["uk".into()]).collect().await;

    let snapshot = session.diagnostics_snapshot();
    assert_eq!(snapshot.strokes_logged, 1);
    assert_eq!(snapshot.transfers_started, 1);
    assert_eq!(snapshot.transfers_joined, 1);
    assert_eq!(snapshot.deletions, 1);
    assert_eq!(snapshot.batches_run, 1);

    session.reset_diagnostics();
    let cleared = session.diagnostics_snapshot();
    assert_eq!(cleared.strokes_logged, 0);
    assert_eq!(cleared.transfers_started, 0);
    assert_eq!(cleared.batches_run, 0);
}

#[tokio::test]
async fn download_models_mixed_presence_scenario() {
    let store = Arc::new(
        MemoryModelStore::new()
            .with_downloaded(["en-US"])
            .with_latency(Duration::from_millis(20)),
    );
    let session = session_with(store.clone(), Arc::new(StubRecognizer::new()));

    let events = session
        .download_models(vec!["en-US".into(), "fr-FR".into()])
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert!(events[0].is_banner());
    assert_eq!(events[1].item.as_deref(), Some("en-US"));
    assert!(events[1].message.contains("already downloaded"));
    assert!(!events[1].done);
    assert_eq!(events[2].item.as_deref(), Some("fr-FR"));
    assert!(events[2].message.contains("downloaded successfully"));
    assert!(events[2].done);
    assert_eq!(store.transfer_count(), 1);
}

#[tokio::test]
async fn done_follows_completion_order_not_submission_order() {
    let store = Arc::new(StaggeredStore {
        inner: MemoryModelStore::new(),
        delays: HashMap::from([
            ("de-DE".to_string(), Duration::from_millis(80)),
            ("ja".to_string(), Duration::from_millis(5)),
        ]),
        completed: Mutex::new(Vec::new()),
    });
    let session = session_with(store.clone(), Arc::new(StubRecognizer::new()));

    let events: Vec<BatchEvent> = session
        .download_models(vec!["de-DE".into(), "ja".into()])
        .collect()
        .await;
    let items: Vec<&BatchEvent> = events.iter().filter(|e| e.item.is_some()).collect();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item.as_deref(), Some("ja"));
    assert!(!items[0].done);
    assert_eq!(items[1].item.as_deref(), Some("de-DE"));
    assert!(items[1].done);
    assert_eq!(*store.completed.lock(), vec!["ja", "de-DE"]);
}

#[tokio::test]
async fn single_download_streams_banner_then_result() {
    let session = session_with(
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    );

    let mut stream = session.download_model("it-IT").expect("valid tag");
    let banner = stream.next().await.expect("banner");
    assert_eq!(banner.message, "Processing singular model it-IT...");
    let result = stream.next().await.expect("result");
    assert!(result.ok && result.done);
    assert!(stream.next().await.is_none(), "stream closes after done");

    let err = session.download_model("zz-ZZ").expect_err("invalid tag");
    assert_eq!(err.kind(), ErrorKind::InvalidModel);
}

#[tokio::test]
async fn delete_round_trip_and_not_downloaded() {
    let session = session_with(
        Arc::new(MemoryModelStore::new().with_downloaded(["pt-BR"])),
        Arc::new(StubRecognizer::new()),
    );

    let event = session.delete_model("pt-BR").await.expect("delete");
    assert!(event.ok && event.done);
    assert_eq!(event.message, "pt-BR model deleted successfully.");
    let handle = session.registry().resolve("pt-BR").expect("valid");
    assert!(!session
        .registry()
        .is_downloaded(&handle)
        .await
        .expect("query"));

    let err = session.delete_model("pt-BR").await.expect_err("absent");
    assert_eq!(
        err,
        InkError::NotDownloaded {
            tag: "pt-BR".into()
        }
    );
}

#[tokio::test]
async fn delete_all_with_nothing_downloaded_emits_single_event() {
    let session = session_with(
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    );
    let events = session
        .delete_all_models()
        .await
        .expect("listing succeeds")
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(!events[0].ok);
    assert!(events[0].done);
}

#[tokio::test]
async fn delete_all_removes_snapshot() {
    let store = Arc::new(MemoryModelStore::new().with_downloaded(["en-US", "ko", "ar"]));
    let session = session_with(store.clone(), Arc::new(StubRecognizer::new()));
    let mut status = session.subscribe_model_events();

    let events = session
        .delete_all_models()
        .await
        .expect("listing succeeds")
        .collect()
        .await;

    assert_eq!(events[0].message, "Deleting models...");
    let items: Vec<&BatchEvent> = events.iter().filter(|e| e.item.is_some()).collect();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|e| e.ok));
    assert_eq!(items.iter().filter(|e| e.done).count(), 1);
    assert!(session
        .list_downloaded_models()
        .await
        .expect("list")
        .is_empty());

    let deleted = std::iter::from_fn(|| status.try_recv().ok())
        .filter(|e| e.status == ModelStatus::Deleted)
        .count();
    assert_eq!(deleted, 3);
}

#[tokio::test]
async fn warm_up_prefetches_default_model_when_configured() {
    let store = Arc::new(MemoryModelStore::new());
    let config = SessionConfig {
        default_model: "fr-FR".into(),
        download_default_on_start: true,
        ..SessionConfig::default()
    };
    let session =
        InkSession::new(config, store.clone(), Arc::new(StubRecognizer::new())).expect("session");

    session.warm_up().await.expect("warm up");
    let models = session.list_downloaded_models().await.expect("list");
    assert!(models.contains(&ModelIdentifier::new("fr-FR")));
    assert_eq!(store.transfer_count(), 1);

    let idle = session_with(
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    );
    assert_eq!(idle.warm_up().await, Ok(None));
}

#[test]
fn unknown_default_model_is_rejected_at_construction() {
    let config = SessionConfig {
        default_model: "nope".into(),
        ..SessionConfig::default()
    };
    let err = InkSession::new(
        config,
        Arc::new(MemoryModelStore::new()),
        Arc::new(StubRecognizer::new()),
    )
    .expect_err("invalid default");
    assert_eq!(err.kind(), ErrorKind::InvalidModel);
}

#[tokio::test]
async fn handle_dispatches_requests_end_to_end() {
    let session = session_with(
        Arc::new(MemoryModelStore::new().with_downloaded(["en-US"])),
        Arc::new(StubRecognizer::new()),
    );

    let requests: Vec<Request> = serde_json::from_value(json!([
        { "op": "logStroke", "x": [0, 1, 2], "y": [0, 1, 0] },
        { "op": "recognize" },
        { "op": "listDownloadedModels" },
        { "op": "erase" }
    ]))
    .expect("requests");

    let mut replies = Vec::new();
    for request in requests {
        replies.push(session.handle(request).await.expect("handled"));
    }

    let recognized = replies[1].to_json().expect("recognition json");
    assert_eq!(recognized["ok"], true);
    assert_eq!(recognized["results"]["candidates"][0], "1 strokes");
    assert_eq!(
        recognized["results"]["candidates"]
            .as_array()
            .expect("array")
            .len(),
        recognized["results"]["scores"]
            .as_array()
            .expect("array")
            .len()
    );

    let listed = replies[2].to_json().expect("models json");
    assert_eq!(listed["models"], json!(["en-US"]));
    assert!(matches!(replies[3], Reply::Erased));
    assert!(session.seal().is_empty());

    let stream = session
        .handle(Request::DeleteModels {
            models: vec!["en-US".into()],
        })
        .await
        .expect("delete batch");
    match stream {
        Reply::Stream(stream) => {
            let events = stream.collect().await;
            assert!(events.last().expect("final").done);
        }
        other => panic!("expected a stream, got {other:?}"),
    }
}
