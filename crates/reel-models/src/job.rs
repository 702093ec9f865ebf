//! Job specification for a batch run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::CallbackSettings;

/// Parameters handed to the generation backend for every prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Backend task selector (e.g. `t2v-1.3B`)
    pub task: String,
    /// Output resolution in the backend's `W*H` notation
    pub size: String,
    /// Model checkpoint directory
    pub ckpt_dir: PathBuf,
    /// Working directory the generation script runs in
    pub project_dir: PathBuf,
    /// Script invoked inside `project_dir`
    pub script: String,
    /// Interpreter used to run `script`
    pub python_bin: String,
    /// File the script writes, relative to `project_dir`
    pub output_file: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            task: "t2v-1.3B".to_string(),
            size: "832*480".to_string(),
            ckpt_dir: PathBuf::from("/root/models/Wan2.1-T2V-1.3B"),
            project_dir: PathBuf::from("/root/project"),
            script: "generate.py".to_string(),
            python_bin: "python3".to_string(),
            output_file: "output.mp4".to_string(),
        }
    }
}

impl GenerationParams {
    /// Absolute path of the file the backend produces.
    pub fn produced_path(&self) -> PathBuf {
        self.project_dir.join(&self.output_file)
    }
}

/// Where artifacts are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Bucket name
    pub bucket: String,
    /// Key prefix, without trailing slash
    pub prefix: String,
}

impl StorageLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Object key for the artifact at `index`: `{prefix}/{index}.mp4`.
    pub fn key_for(&self, index: usize) -> String {
        format!("{}/{}.mp4", self.prefix, index)
    }
}

/// Immutable description of one batch run.
///
/// Built once at process start and shared by reference with every
/// component for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job identifier reported to the observer
    pub job_id: String,
    /// Target clip duration in seconds (always positive)
    pub target_duration: u32,
    /// Prompts in submission order
    pub prompts: Vec<String>,
    /// Generation backend parameters
    pub generation: GenerationParams,
    /// Storage destination
    pub storage: StorageLocation,
    /// Base URL artifacts are publicly served from, without trailing slash
    pub public_base_url: String,
    /// Callback settings; `None` disables reporting
    pub callback: Option<CallbackSettings>,
    /// `YYYY/MM/DD` date the run started
    pub date_path: String,
}

impl JobSpec {
    /// Number of prompts in the batch.
    pub fn total_prompts(&self) -> usize {
        self.prompts.len()
    }

    /// Public URL of a stored object key.
    pub fn artifact_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    /// Public URL of the artifact at `index`.
    pub fn artifact_url_for(&self, index: usize) -> String {
        self.artifact_url(&self.storage.key_for(index))
    }
}

/// Date segment used in default storage prefixes.
pub fn date_path(now: DateTime<Utc>) -> String {
    now.format("%Y/%m/%d").to_string()
}

/// Default storage prefix: `video/{date_path}/{job_id}`.
pub fn default_prefix(date_path: &str, job_id: &str) -> String {
    format!("video/{}/{}", date_path, job_id)
}
