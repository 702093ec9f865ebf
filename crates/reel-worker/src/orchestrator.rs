//! Batch orchestrator.
//!
//! Drives one ordered pass over the prompt list. Each item runs
//! generate, normalize, upload, progress, strictly in that order, and no
//! two items overlap. Generation and upload failures are contained at
//! the item; anything else stops the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Instrument};

use reel_callback::{CallbackEvent, EventSink, RunSnapshot};
use reel_media::{remove_if_exists, DurationNormalizer, MediaTool};
use reel_models::{ItemResult, JobSpec, RunSummary};
use reel_storage::ArtifactStore;

use crate::config::WorkerSettings;
use crate::error::{FailureKind, WorkerError, WorkerResult};
use crate::generation::GenerationInvoker;
use crate::logging::JobLogger;
use crate::retry::{retry_async, RetryConfig};

/// Content of the stand-in clip written when generation fails.
pub const PLACEHOLDER_MARKER: &[u8] = b"PLACEHOLDER";

/// Scratch files of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPaths {
    /// Generated clip
    pub raw: PathBuf,
    /// Stand-in clip after a generation failure
    pub placeholder: PathBuf,
    /// Normalized clip that gets uploaded
    pub final_: PathBuf,
}

impl ItemPaths {
    pub fn new(work_dir: &Path, job_id: &str, index: usize) -> Self {
        Self {
            raw: work_dir.join(format!("{}_{}.mp4", job_id, index)),
            placeholder: work_dir.join(format!("{}_{}_placeholder.mp4", job_id, index)),
            final_: work_dir.join(format!("{}_{}_final.mp4", job_id, index)),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.raw, &self.placeholder, &self.final_]
    }
}

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn GenerationInvoker>,
    pub media: Arc<dyn MediaTool>,
    pub store: Arc<dyn ArtifactStore>,
    pub events: Arc<dyn EventSink>,
}

/// Per-item results plus the derived summary.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub items: Vec<ItemResult>,
    pub summary: RunSummary,
}

pub struct BatchOrchestrator {
    spec: Arc<JobSpec>,
    settings: WorkerSettings,
    collaborators: Collaborators,
    normalizer: DurationNormalizer,
    logger: JobLogger,
}

impl BatchOrchestrator {
    pub fn new(spec: Arc<JobSpec>, settings: WorkerSettings, collaborators: Collaborators) -> Self {
        let normalizer = DurationNormalizer::new(Arc::clone(&collaborators.media));
        let logger = JobLogger::new(&spec.job_id, "batch");
        Self {
            spec,
            settings,
            collaborators,
            normalizer,
            logger,
        }
    }

    /// Run the whole batch and emit the terminal event.
    ///
    /// Never returns an error: a fatal failure becomes a `Failed` summary.
    pub async fn run(&self) -> RunReport {
        let span = self.logger.create_span();
        self.run_batch().instrument(span).await
    }

    async fn run_batch(&self) -> RunReport {
        self.logger.log_start(&format!(
            "{} prompts, target {}s",
            self.spec.total_prompts(),
            self.spec.target_duration
        ));

        self.emit(CallbackEvent::Preparing(RunSnapshot::from_spec(&self.spec)))
            .await;

        let mut items = Vec::with_capacity(self.spec.total_prompts());
        let mut urls = Vec::new();

        let fatal = match self.run_items(&mut items, &mut urls).await {
            Ok(()) => None,
            Err(e) => {
                self.logger.log_error(&format!("Batch aborted: {}", e));
                Some(e.to_string())
            }
        };

        match &fatal {
            None => {
                self.emit(CallbackEvent::Completed { urls: urls.clone() }).await;
            }
            Some(reason) => {
                self.emit(CallbackEvent::Fatal {
                    reason: reason.clone(),
                    urls: urls.clone(),
                })
                .await;
            }
        }

        let summary = RunSummary::from_results(&items, fatal);
        self.logger.log_completion(&format!(
            "{} with {}/{} clips uploaded",
            summary.status.as_str(),
            summary.urls.len(),
            self.spec.total_prompts()
        ));

        RunReport { items, summary }
    }

    async fn run_items(&self, items: &mut Vec<ItemResult>, urls: &mut Vec<String>) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&self.settings.work_dir).await?;

        for (index, prompt) in self.spec.prompts.iter().enumerate() {
            if index > 0 && !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }

            let paths = ItemPaths::new(&self.settings.work_dir, &self.spec.job_id, index);
            let mut item = ItemResult::started(index, prompt.as_str());

            let outcome = self.process_item(&mut item, &paths, urls).await;
            self.cleanup(&paths).await;
            items.push(item);
            outcome?;
        }

        Ok(())
    }

    async fn process_item(
        &self,
        item: &mut ItemResult,
        paths: &ItemPaths,
        urls: &mut Vec<String>,
    ) -> WorkerResult<()> {
        let index = item.index;
        self.logger.log_item(index, "generating");

        let retry = RetryConfig::new(format!("generation[{}]", index))
            .with_max_retries(self.settings.generation_retries);
        let generated = retry_async(
            &retry,
            || {
                self.collaborators
                    .generator
                    .run(&item.prompt, &self.spec.generation, &paths.raw)
            },
            |e: &WorkerError| e.kind() == FailureKind::Generation,
        )
        .await;

        let artifact = match generated {
            Ok(path) => {
                item.mark_generated();
                path
            }
            Err(e) if e.kind() == FailureKind::Generation => {
                let reason = e.to_string();
                self.logger
                    .log_item_warning(index, &format!("{}, continuing with placeholder", reason));
                item.mark_generation_failed(reason.as_str());
                self.emit(CallbackEvent::ItemFailed {
                    index,
                    prompt: item.prompt.clone(),
                    reason,
                    urls: urls.clone(),
                })
                .await;
                write_placeholder(&paths.placeholder).await?;
                paths.placeholder.clone()
            }
            Err(e) => return Err(e),
        };

        match self.normalize_and_upload(index, &artifact, &paths.final_).await {
            Ok(url) => {
                self.logger.log_item(index, &format!("uploaded {}", url));
                item.mark_uploaded(url.as_str());
                urls.push(url.clone());
                self.emit(CallbackEvent::UploadSucceeded {
                    index,
                    url,
                    urls: urls.clone(),
                })
                .await;
            }
            Err(e) if e.kind() == FailureKind::Upload => {
                let reason = e.to_string();
                self.logger.log_item_warning(index, &reason);
                item.mark_upload_failed(reason.as_str());
                self.emit(CallbackEvent::UploadFailed {
                    index,
                    reason,
                    urls: urls.clone(),
                })
                .await;
            }
            Err(e) => return Err(e),
        }

        self.emit(CallbackEvent::Progress {
            index,
            prompt: item.prompt.clone(),
            current_url: item.artifact_url.clone(),
            urls: urls.clone(),
        })
        .await;

        Ok(())
    }

    /// Normalize the artifact and store it, returning its public URL.
    async fn normalize_and_upload(&self, index: usize, artifact: &Path, output: &Path) -> WorkerResult<String> {
        let plan = self
            .normalizer
            .normalize(artifact, output, self.spec.target_duration)
            .await
            .map_err(|e| WorkerError::normalization_failed(e.to_string()))?;
        debug!(index, %plan, "Normalized clip");

        let key = self.spec.storage.key_for(index);
        let retry = RetryConfig::new(format!("upload[{}]", index))
            .with_max_retries(self.settings.upload_retries);
        let store = &self.collaborators.store;
        let object_key = key.as_str();
        retry_async(
            &retry,
            || async move { store.upload(output, object_key).await.map_err(WorkerError::from) },
            |e: &WorkerError| e.kind() == FailureKind::Upload,
        )
        .await?;

        Ok(self.spec.artifact_url(&key))
    }

    async fn emit(&self, event: CallbackEvent) {
        let status = self.collaborators.events.emit(&event).await;
        if !status.is_delivered() {
            debug!(event = event.kind().path_segment(), ?status, "Callback not delivered");
        }
    }

    async fn cleanup(&self, paths: &ItemPaths) {
        for path in paths.all() {
            if let Err(e) = remove_if_exists(path).await {
                debug!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

async fn write_placeholder(path: &Path) -> WorkerResult<()> {
    tokio::fs::write(path, PLACEHOLDER_MARKER).await.map_err(|e| {
        WorkerError::fatal(format!("failed to write placeholder {}: {}", path.display(), e))
    })
}
