//! End-to-end batch runs against in-memory collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use reel_callback::{CallbackEvent, CallbackReporter, DeliveryStatus, EventKind, EventSink};
use reel_media::{MediaError, MediaResult, MediaTool};
use reel_models::{GenerationParams, ItemOutcome, JobSpec, RunStatus, StorageLocation};
use reel_storage::{ArtifactStore, StorageError, StorageResult};
use reel_worker::{
    BatchOrchestrator, Collaborators, GenerationInvoker, RunReport, WorkerError, WorkerResult,
    WorkerSettings, PLACEHOLDER_MARKER,
};

#[derive(Clone, Copy)]
enum Behaviour {
    /// Write a clip
    Succeed,
    /// Backend error
    Fail,
    /// Backend error on the first attempt only
    FailOnce,
    /// Error outside the recovery points
    Crash,
}

#[derive(Default)]
struct FakeGenerator {
    behaviours: HashMap<String, Behaviour>,
    attempts: AtomicU32,
    calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn with(pairs: &[(&str, Behaviour)]) -> Self {
        Self {
            behaviours: pairs.iter().map(|(p, b)| (p.to_string(), *b)).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl GenerationInvoker for FakeGenerator {
    async fn run(&self, prompt: &str, _: &GenerationParams, dest: &Path) -> WorkerResult<PathBuf> {
        self.calls.lock().unwrap().push(prompt.to_string());
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        match self.behaviours.get(prompt).copied().unwrap_or(Behaviour::Succeed) {
            Behaviour::Succeed => {}
            Behaviour::Fail => return Err(WorkerError::generation_failed("exit status 1")),
            Behaviour::FailOnce if attempt == 0 => {
                return Err(WorkerError::generation_failed("CUDA out of memory"))
            }
            Behaviour::FailOnce => {}
            Behaviour::Crash => return Err(WorkerError::fatal("disk vanished")),
        }

        tokio::fs::write(dest, format!("clip:{}", prompt)).await?;
        Ok(dest.to_path_buf())
    }
}

/// Reports a fixed duration for real clips and fails to probe placeholders.
struct FakeMediaTool {
    duration: f64,
    fail_transforms: bool,
    ops: Mutex<Vec<String>>,
}

impl FakeMediaTool {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            fail_transforms: false,
            ops: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail_transforms: true,
            ..Self::new(10.0)
        }
    }

    async fn transform(&self, op: String, input: &Path, output: &Path) -> MediaResult<()> {
        self.ops.lock().unwrap().push(op);
        if self.fail_transforms {
            return Err(MediaError::ffmpeg_failed("encoder exploded", None, Some(1)));
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn probe_duration(&self, input: &Path) -> MediaResult<f64> {
        let bytes = tokio::fs::read(input).await?;
        if bytes == PLACEHOLDER_MARKER {
            return Err(MediaError::invalid_media("no video stream"));
        }
        Ok(self.duration)
    }

    async fn truncate_copy(&self, input: &Path, output: &Path, seconds: u32) -> MediaResult<()> {
        self.transform(format!("truncate:{}", seconds), input, output).await
    }

    async fn loop_trim(&self, input: &Path, output: &Path, loops: u32, seconds: u32) -> MediaResult<()> {
        self.transform(format!("loop:{}:{}", loops, seconds), input, output).await
    }

    async fn copy(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.transform("copy".to_string(), input, output).await
    }
}

#[derive(Default)]
struct FakeStore {
    fail_keys: HashSet<String>,
    fail_once: bool,
    attempts: AtomicU32,
    objects: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_keys.contains(key) || (self.fail_once && attempt == 0) {
            return Err(StorageError::upload_failed("access denied"));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        self.objects.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().unwrap().clone()
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: &CallbackEvent) -> DeliveryStatus {
        self.events.lock().unwrap().push(event.clone());
        DeliveryStatus::Delivered { status: 200 }
    }
}

struct Harness {
    _scratch: TempDir,
    generator: Arc<FakeGenerator>,
    media: Arc<FakeMediaTool>,
    store: Arc<FakeStore>,
    sink: Arc<RecordingSink>,
    settings: WorkerSettings,
}

impl Harness {
    fn new(generator: FakeGenerator, media: FakeMediaTool, store: FakeStore) -> Self {
        let work_dir = TempDir::new().unwrap();
        let settings = WorkerSettings {
            work_dir: work_dir.path().join("work"),
            item_delay: Duration::ZERO,
            ..WorkerSettings::default()
        };
        Self {
            _scratch: work_dir,
            generator: Arc::new(generator),
            media: Arc::new(media),
            store: Arc::new(store),
            sink: Arc::new(RecordingSink::default()),
            settings,
        }
    }

    async fn run(&self, prompts: &[&str]) -> RunReport {
        let collaborators = Collaborators {
            generator: self.generator.clone(),
            media: self.media.clone(),
            store: self.store.clone(),
            events: self.sink.clone(),
        };
        BatchOrchestrator::new(Arc::new(spec(prompts)), self.settings.clone(), collaborators)
            .run()
            .await
    }

    fn scratch_files(&self) -> usize {
        std::fs::read_dir(&self.settings.work_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn spec(prompts: &[&str]) -> JobSpec {
    JobSpec {
        job_id: "gv_test".to_string(),
        target_duration: 10,
        prompts: prompts.iter().map(|p| p.to_string()).collect(),
        generation: GenerationParams::default(),
        storage: StorageLocation::new("clips", "video/2026/10/19/gv_test"),
        public_base_url: "https://cdn.example.com".to_string(),
        callback: None,
        date_path: "2026/10/19".to_string(),
    }
}

fn url(index: usize) -> String {
    format!("https://cdn.example.com/video/2026/10/19/gv_test/{}.mp4", index)
}

#[tokio::test]
async fn test_single_long_clip_is_trimmed_and_uploaded() {
    let h = Harness::new(
        FakeGenerator::default(),
        FakeMediaTool::new(15.0),
        FakeStore::default(),
    );

    let report = h.run(&["a cat"]).await;

    assert_eq!(report.summary.status, RunStatus::Completed);
    assert_eq!(report.summary.status.exit_code(), 0);
    assert_eq!(report.summary.urls, vec![url(0)]);
    assert_eq!(*h.media.ops.lock().unwrap(), vec!["truncate:10"]);

    let objects = h.store.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].0, "video/2026/10/19/gv_test/0.mp4");
    assert_eq!(objects[0].1, b"clip:a cat");

    assert_eq!(
        h.sink.kinds(),
        vec![
            EventKind::Preparing,
            EventKind::UploadResult,
            EventKind::Progress,
            EventKind::TerminalSuccess,
        ]
    );
    let events = h.sink.events();
    assert_eq!(
        events[2],
        CallbackEvent::Progress {
            index: 0,
            prompt: "a cat".to_string(),
            current_url: Some(url(0)),
            urls: vec![url(0)],
        }
    );
    assert_eq!(events[3], CallbackEvent::Completed { urls: vec![url(0)] });

    // Scratch files are removed after each item
    assert_eq!(h.scratch_files(), 0);
}

#[tokio::test]
async fn test_generation_failure_continues_with_placeholder() {
    let h = Harness::new(
        FakeGenerator::with(&[("x", Behaviour::Fail)]),
        FakeMediaTool::new(5.0),
        FakeStore::default(),
    );

    let report = h.run(&["x", "y"]).await;

    assert_eq!(report.summary.status, RunStatus::Completed);
    assert_eq!(report.summary.urls, vec![url(0), url(1)]);
    assert_eq!(report.items[0].generation, Some(ItemOutcome::GenerationFailed));
    assert_eq!(report.items[0].upload, Some(ItemOutcome::Uploaded));
    assert_eq!(report.items[1].outcome(), Some(ItemOutcome::Uploaded));

    let events = h.sink.events();
    assert!(matches!(
        &events[1],
        CallbackEvent::ItemFailed { index: 0, prompt, urls, .. } if prompt == "x" && urls.is_empty()
    ));

    // Placeholder fails to probe so it takes the truncating copy; "y" is looped
    assert_eq!(*h.media.ops.lock().unwrap(), vec!["truncate:10", "loop:2:10"]);

    let objects = h.store.objects.lock().unwrap();
    assert_eq!(objects[0].1, PLACEHOLDER_MARKER);
    assert_eq!(objects[1].1, b"clip:y");
}

#[tokio::test]
async fn test_empty_prompt_list() {
    let h = Harness::new(
        FakeGenerator::default(),
        FakeMediaTool::new(10.0),
        FakeStore::default(),
    );

    let report = h.run(&[]).await;

    assert!(report.items.is_empty());
    assert_eq!(report.summary.status, RunStatus::Completed);
    assert!(report.summary.urls.is_empty());
    assert_eq!(
        h.sink.kinds(),
        vec![EventKind::Preparing, EventKind::TerminalSuccess]
    );
    assert!(h.generator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_failure_leaves_a_gap() {
    let store = FakeStore {
        fail_keys: HashSet::from(["video/2026/10/19/gv_test/1.mp4".to_string()]),
        ..Default::default()
    };
    let h = Harness::new(FakeGenerator::default(), FakeMediaTool::new(10.0), store);

    let report = h.run(&["a", "b", "c"]).await;

    assert_eq!(report.summary.status, RunStatus::Completed);
    assert_eq!(report.summary.urls, vec![url(0), url(2)]);
    assert_eq!(report.items[1].upload, Some(ItemOutcome::UploadFailed));
    assert!(report.items[1].artifact_url.is_none());

    let events = h.sink.events();
    let failed = events
        .iter()
        .find(|e| matches!(e, CallbackEvent::UploadFailed { .. }))
        .unwrap();
    assert!(matches!(
        failed,
        CallbackEvent::UploadFailed { index: 1, urls, .. } if urls == &vec![url(0)]
    ));
    assert!(events.contains(&CallbackEvent::Progress {
        index: 1,
        prompt: "b".to_string(),
        current_url: None,
        urls: vec![url(0)],
    }));
}

#[tokio::test]
async fn test_normalization_failure_is_reported_as_upload_failure() {
    let h = Harness::new(
        FakeGenerator::default(),
        FakeMediaTool::failing(),
        FakeStore::default(),
    );

    let report = h.run(&["a", "b"]).await;

    assert_eq!(report.summary.status, RunStatus::Completed);
    assert!(report.summary.urls.is_empty());
    assert!(h.store.objects.lock().unwrap().is_empty());
    assert!(report
        .items
        .iter()
        .all(|item| item.upload == Some(ItemOutcome::UploadFailed)));
    assert!(report.items[0]
        .upload_error
        .as_deref()
        .unwrap()
        .contains("Normalization failed"));
}

#[tokio::test]
async fn test_unclassified_failure_aborts_the_batch() {
    let h = Harness::new(
        FakeGenerator::with(&[("b", Behaviour::Crash)]),
        FakeMediaTool::new(10.0),
        FakeStore::default(),
    );

    let report = h.run(&["a", "b", "c"]).await;

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.status.exit_code(), 1);
    assert_eq!(report.summary.urls, vec![url(0)]);
    assert!(report
        .summary
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("disk vanished"));

    // "c" is never attempted
    assert_eq!(*h.generator.calls.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(
        h.sink.events().last(),
        Some(&CallbackEvent::Fatal {
            reason: "Fatal error: disk vanished".to_string(),
            urls: vec![url(0)],
        })
    );
}

#[tokio::test]
async fn test_progress_arrives_in_ascending_order() {
    let h = Harness::new(
        FakeGenerator::with(&[("p2", Behaviour::Fail)]),
        FakeMediaTool::new(12.0),
        FakeStore::default(),
    );

    let report = h.run(&["p0", "p1", "p2", "p3", "p4"]).await;

    assert_eq!(report.items.len(), 5);
    let progress: Vec<usize> = h
        .sink
        .events()
        .iter()
        .filter(|e| e.kind() == EventKind::Progress)
        .filter_map(|e| e.index())
        .collect();
    assert_eq!(progress, vec![0, 1, 2, 3, 4]);

    // Every per-item event of index i precedes every event of index i + 1
    let indices: Vec<usize> = h.sink.events().iter().filter_map(|e| e.index()).collect();
    assert!(indices.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_rerun_is_deterministic() {
    let first = Harness::new(
        FakeGenerator::with(&[("x", Behaviour::Fail)]),
        FakeMediaTool::new(7.5),
        FakeStore::default(),
    );
    let second = Harness::new(
        FakeGenerator::with(&[("x", Behaviour::Fail)]),
        FakeMediaTool::new(7.5),
        FakeStore::default(),
    );

    let a = first.run(&["x", "y", "z"]).await;
    let b = second.run(&["x", "y", "z"]).await;

    assert_eq!(a.items, b.items);
    assert_eq!(a.summary, b.summary);
    assert_eq!(first.sink.events(), second.sink.events());
}

#[tokio::test]
async fn test_disabled_reporter_still_completes() {
    let h = Harness::new(
        FakeGenerator::default(),
        FakeMediaTool::new(10.0),
        FakeStore::default(),
    );
    let collaborators = Collaborators {
        generator: h.generator.clone(),
        media: h.media.clone(),
        store: h.store.clone(),
        events: Arc::new(CallbackReporter::disabled("gv_test")),
    };

    let report = BatchOrchestrator::new(Arc::new(spec(&["a"])), h.settings.clone(), collaborators)
        .run()
        .await;

    assert_eq!(report.summary.status, RunStatus::Completed);
    assert_eq!(report.summary.urls, vec![url(0)]);
    assert_eq!(*h.media.ops.lock().unwrap(), vec!["copy"]);
}

#[tokio::test]
async fn test_bounded_retries_recover() {
    let store = FakeStore {
        fail_once: true,
        ..Default::default()
    };
    let mut h = Harness::new(
        FakeGenerator::with(&[("a", Behaviour::FailOnce)]),
        FakeMediaTool::new(10.0),
        store,
    );
    h.settings.generation_retries = 1;
    h.settings.upload_retries = 1;

    let report = h.run(&["a"]).await;

    assert_eq!(report.items[0].generation, Some(ItemOutcome::Generated));
    assert_eq!(report.items[0].upload, Some(ItemOutcome::Uploaded));
    assert_eq!(h.generator.calls.lock().unwrap().len(), 2);
    assert_eq!(h.store.attempts.load(Ordering::SeqCst), 2);
    assert!(!h.sink.kinds().contains(&EventKind::ItemFailure));
}

#[tokio::test]
async fn test_single_attempt_by_default() {
    let h = Harness::new(
        FakeGenerator::with(&[("a", Behaviour::FailOnce)]),
        FakeMediaTool::new(10.0),
        FakeStore::default(),
    );

    let report = h.run(&["a"]).await;

    assert_eq!(report.items[0].generation, Some(ItemOutcome::GenerationFailed));
    assert_eq!(h.generator.calls.lock().unwrap().len(), 1);
}
