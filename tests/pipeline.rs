//! Integration tests for the extract → normalize pipeline.
//!
//! OCR and the LLM are replaced with in-process fakes so these run without
//! tesseract or network access. Live runs are in `tests/e2e.rs`.

use screenshot_ocr::{
    extract_to_file_with_engine, extract_with_engine, normalize_file_with_client,
    normalize_results, read_results, write_results, Completion, CompletionClient,
    CompletionOptions, NormalizationState, NormalizeError, OcrEngine, PipelineConfig,
    PipelineProgressCallback, ResultMap, ShotOcrError, Stage,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Returns canned text per filename; errors for unknown files.
struct CannedOcr {
    texts: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl CannedOcr {
    fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            texts: pairs
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

impl OcrEngine for CannedOcr {
    fn recognize(&self, image: &Path) -> Result<String, ShotOcrError> {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(name.clone());
        self.texts
            .get(&name)
            .cloned()
            .ok_or_else(|| ShotOcrError::OcrFailed {
                path: image.to_path_buf(),
                detail: "unreadable".into(),
            })
    }
}

/// Echoes the input lines back upper-cased, failing when a prompt contains
/// `fail_marker`.
struct ScriptedClient {
    fail_marker: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self {
            fail_marker: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::new()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }
}

impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, screenshot_ocr::ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(ref marker) = self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(screenshot_ocr::ServiceError("service unavailable".into()));
            }
        }

        let input = prompt.rsplit("Input: ").next().unwrap_or("[]");
        let lines: Vec<String> = serde_json::from_str(input).unwrap_or_default();
        let upper: Vec<String> = lines.iter().map(|l| l.to_uppercase()).collect();
        Ok(Completion {
            content: serde_json::to_string(&upper).unwrap(),
            input_tokens: 50,
            output_tokens: 10,
        })
    }
}

/// Records every callback as a short string.
#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for RecordingCallback {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {stage} {total}"));
    }

    fn on_file_start(&self, stage: Stage, file: &str, index: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{stage} {file} {index}/{total}"));
    }

    fn on_file_fallback(&self, file: &str, _index: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("fallback {file}"));
    }

    fn on_stage_complete(&self, stage: Stage, _total: usize, success: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {stage} {success}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn screenshot_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }
    dir
}

fn fast_config() -> PipelineConfig {
    PipelineConfig::builder()
        .request_delay_ms(0)
        .build()
        .unwrap()
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const SHOT1: &str = "Q Search\n• Settings\nSettings\n日 本 語\n##@@\nok\n\n";
const SHOT2: &str = "O Home\nProfile page\n©\nআমার সোনার বাংলা\n";

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn extraction_cleans_and_orders_by_filename() {
    let dir = screenshot_dir(&["shot2.PNG", "shot1.png", "notes.txt", "photo.jpeg"]);
    let engine = CannedOcr::new(&[
        ("shot1.png", SHOT1),
        ("shot2.PNG", SHOT2),
        ("photo.jpeg", "   \n"),
    ]);

    let report = extract_with_engine(dir.path(), engine.clone(), &fast_config())
        .await
        .unwrap();

    // Filename order, extension case ignored.
    assert_eq!(
        *engine.calls.lock().unwrap(),
        vec!["photo.jpeg", "shot1.png", "shot2.PNG"]
    );
    assert_eq!(report.stats.files, 3);
    assert_eq!(report.results["shot1.png"], lines(&["Search", "Settings", "日本語"]));
    assert_eq!(
        report.results["shot2.PNG"],
        lines(&["Home", "Profile page", "আমার সোনার বাংলা"])
    );
    assert!(report.results["photo.jpeg"].is_empty());
    assert!(!report.results.contains_key("notes.txt"));
    assert_eq!(report.stats.duplicate_lines, 1);
}

#[tokio::test]
async fn extraction_output_has_no_empty_or_duplicate_lines() {
    let dir = screenshot_dir(&["a.png"]);
    let engine = CannedOcr::new(&[("a.png", "foo bar\n  foo   bar \n\n• foo bar\nO\n")]);

    let report = extract_with_engine(dir.path(), engine, &fast_config())
        .await
        .unwrap();

    let kept = &report.results["a.png"];
    assert_eq!(*kept, lines(&["foo bar"]));
    for line in kept {
        assert!(!line.trim().is_empty());
        assert_eq!(line, line.trim());
    }
}

#[tokio::test]
async fn extraction_is_deterministic() {
    let dir = screenshot_dir(&["shot1.png", "shot2.PNG"]);
    let out = TempDir::new().unwrap();
    let first = out.path().join("first.json");
    let second = out.path().join("second.json");

    for path in [&first, &second] {
        let engine = CannedOcr::new(&[("shot1.png", SHOT1), ("shot2.PNG", SHOT2)]);
        let report = extract_with_engine(dir.path(), engine, &fast_config())
            .await
            .unwrap();
        write_results(path, &report.results).await.unwrap();
    }

    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
    // Non-ASCII text is written as-is, not escaped.
    let json = std::fs::read_to_string(&first).unwrap();
    assert!(json.contains("日本語"));
    assert!(json.ends_with('\n'));
}

#[tokio::test]
async fn extraction_aborts_on_first_unreadable_image() {
    let dir = screenshot_dir(&["a.png", "b.png", "c.png"]);
    let engine = CannedOcr::new(&[("a.png", "hello"), ("c.png", "world")]);

    let err = extract_with_engine(dir.path(), engine.clone(), &fast_config())
        .await
        .unwrap_err();

    assert!(matches!(err, ShotOcrError::OcrFailed { .. }), "{err:?}");
    // c.png is never reached.
    assert_eq!(*engine.calls.lock().unwrap(), vec!["a.png", "b.png"]);
}

#[tokio::test]
async fn extraction_rejects_missing_folder() {
    let engine = CannedOcr::new(&[]);
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("output.json");

    let err = extract_to_file_with_engine(
        tmp.path().join("screenshots"),
        &output,
        engine,
        &fast_config(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ShotOcrError::InputDirNotFound { .. }), "{err:?}");
    assert!(!output.exists());
}

#[tokio::test]
async fn folder_without_images_writes_empty_map() {
    let out = TempDir::new().unwrap();

    for names in [&[][..], &["readme.txt", "logo.gif"][..]] {
        let dir = screenshot_dir(names);
        let engine = CannedOcr::new(&[]);
        let output = out.path().join("output.json");

        let report =
            extract_to_file_with_engine(dir.path(), &output, engine.clone(), &fast_config())
                .await
                .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.stats.files, 0);
        assert!(engine.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "{}\n");
    }
}

// ── Normalization ────────────────────────────────────────────────────────────

#[tokio::test]
async fn normalization_falls_back_per_file() {
    let mut results = ResultMap::new();
    results.insert("shot1.png".into(), lines(&["Hello", "World"]));
    results.insert("shot2.png".into(), lines(&["broken entry"]));
    results.insert("shot3.png".into(), lines(&["last one"]));

    let client = ScriptedClient::failing_on("broken entry");
    let report = normalize_results(&results, &client, &fast_config()).await;

    assert_eq!(report.results["shot1.png"], lines(&["HELLO", "WORLD"]));
    assert_eq!(report.results["shot2.png"], lines(&["broken entry"]));
    assert_eq!(report.results["shot3.png"], lines(&["LAST ONE"]));
    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.fallback_files, 1);
    assert_eq!(report.stats.normalized_files, 2);
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);

    let fallback = &report.outcomes[1];
    assert_eq!(fallback.filename, "shot2.png");
    match &fallback.state {
        NormalizationState::FallbackOriginal { reason } => {
            assert!(matches!(reason, NormalizeError::ServiceFailed { .. }));
            assert_eq!(reason.file(), "shot2.png");
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn normalization_keeps_every_key() {
    let mut results = ResultMap::new();
    results.insert("empty.png".into(), Vec::new());
    results.insert("full.png".into(), lines(&["text"]));

    let client = ScriptedClient::new();
    let report = normalize_results(&results, &client, &fast_config()).await;

    assert_eq!(
        report.results.keys().collect::<Vec<_>>(),
        results.keys().collect::<Vec<_>>()
    );
    assert!(report.results["empty.png"].is_empty());
    // The empty entry does not reach the service.
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn normalization_waits_between_calls() {
    let mut results = ResultMap::new();
    for name in ["a.png", "b.png", "c.png"] {
        results.insert(name.into(), lines(&["some text"]));
    }
    let config = PipelineConfig::builder()
        .request_delay_ms(60)
        .build()
        .unwrap();

    let client = ScriptedClient::new();
    normalize_results(&results, &client, &config).await;

    let times = client.call_times.lock().unwrap();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(60));
    }
}

#[tokio::test]
async fn normalization_times_out_to_fallback() {
    let mut results = ResultMap::new();
    results.insert("slow.png".into(), lines(&["waiting"]));
    let config = PipelineConfig::builder()
        .request_delay_ms(0)
        .api_timeout_secs(1)
        .build()
        .unwrap();

    let client = ScriptedClient::slow(Duration::from_secs(3));
    let report = normalize_results(&results, &client, &config).await;

    assert_eq!(report.results["slow.png"], lines(&["waiting"]));
    assert!(matches!(
        report.outcomes[0].state,
        NormalizationState::FallbackOriginal {
            reason: NormalizeError::Timeout { .. }
        }
    ));
}

#[tokio::test]
async fn normalize_file_round_trips_through_disk() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("output.json");
    let output = tmp.path().join("normalized_output.json");

    let mut results = ResultMap::new();
    results.insert("shot1.png".into(), lines(&["Search", "日本語"]));
    write_results(&input, &results).await.unwrap();

    let client = ScriptedClient::new();
    let report = normalize_file_with_client(&input, &output, &client, &fast_config())
        .await
        .unwrap();

    let written = read_results(&output).await.unwrap();
    assert_eq!(written, report.results);
    assert_eq!(written["shot1.png"], lines(&["SEARCH", "日本語"]));
    // Input is untouched.
    assert_eq!(read_results(&input).await.unwrap(), results);
}

#[tokio::test]
async fn normalize_file_fails_on_missing_input() {
    let tmp = TempDir::new().unwrap();
    let client = ScriptedClient::new();

    let err = normalize_file_with_client(
        tmp.path().join("output.json"),
        tmp.path().join("normalized_output.json"),
        &client,
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ShotOcrError::ResultsReadFailed { .. }), "{err:?}");
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert!(!tmp.path().join("normalized_output.json").exists());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_callbacks_follow_processing_order() {
    let dir = screenshot_dir(&["b.png", "a.png"]);
    let engine = CannedOcr::new(&[("a.png", "alpha text"), ("b.png", "beta text")]);
    let recorder = Arc::new(RecordingCallback::default());
    let config = PipelineConfig::builder()
        .request_delay_ms(0)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let extracted = extract_with_engine(dir.path(), engine, &config)
        .await
        .unwrap();
    let client = ScriptedClient::failing_on("beta text");
    normalize_results(&extracted.results, &client, &config).await;

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start extract 2",
            "extract a.png 1/2",
            "extract b.png 2/2",
            "done extract 2",
            "start normalize 2",
            "normalize a.png 1/2",
            "normalize b.png 2/2",
            "fallback b.png",
            "done normalize 1",
        ]
    );
}
