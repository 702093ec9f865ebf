//! Callback events and their wire payloads.
//!
//! Payload keys follow the observer's naming (`current_index`,
//! `video_urls`, `failed_reason`, ...). Statuses and error kinds are
//! upper snake case.

use serde::Serialize;
use serde_json::Value;

use reel_models::JobSpec;

/// Status field carried by every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackStatus {
    PreparingProcessing,
    Generating,
    Success,
    Completed,
    Failed,
}

/// Error classification carried by failure payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    GenerateFailed,
    FatalError,
}

/// Logical event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Preparing,
    ItemFailure,
    UploadResult,
    Progress,
    TerminalSuccess,
    TerminalFailure,
}

impl EventKind {
    /// Path segment the event is posted to.
    pub fn path_segment(&self) -> &'static str {
        match self {
            EventKind::Preparing => "process",
            EventKind::ItemFailure | EventKind::TerminalFailure => "fail",
            EventKind::UploadResult => "upload",
            EventKind::Progress => "progress",
            EventKind::TerminalSuccess => "success",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::TerminalSuccess | EventKind::TerminalFailure)
    }
}

/// Run configuration snapshot sent with the preparing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    #[serde(skip)]
    pub job_id: String,
    pub total_prompts: usize,
    pub upload_base_path: String,
    pub target_duration: u32,
    pub wan_task: String,
    pub wan_size: String,
    pub ckpt_dir: String,
    pub project_dir: String,
    pub public_base_url: String,
    pub s3_bucket: String,
    pub date_path: String,
}

impl RunSnapshot {
    pub fn from_spec(spec: &JobSpec) -> Self {
        Self {
            job_id: spec.job_id.clone(),
            total_prompts: spec.total_prompts(),
            upload_base_path: spec.storage.prefix.clone(),
            target_duration: spec.target_duration,
            wan_task: spec.generation.task.clone(),
            wan_size: spec.generation.size.clone(),
            ckpt_dir: spec.generation.ckpt_dir.display().to_string(),
            project_dir: spec.generation.project_dir.display().to_string(),
            public_base_url: spec.public_base_url.clone(),
            s3_bucket: spec.storage.bucket.clone(),
            date_path: spec.date_path.clone(),
        }
    }
}

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    /// Run is about to start
    Preparing(RunSnapshot),
    /// Generation failed for an item; a placeholder continues in its place
    ItemFailed {
        index: usize,
        prompt: String,
        reason: String,
        urls: Vec<String>,
    },
    /// Item artifact stored
    UploadSucceeded {
        index: usize,
        url: String,
        urls: Vec<String>,
    },
    /// Item artifact could not be normalized or stored
    UploadFailed {
        index: usize,
        reason: String,
        urls: Vec<String>,
    },
    /// Item finished
    Progress {
        index: usize,
        prompt: String,
        current_url: Option<String>,
        urls: Vec<String>,
    },
    /// All items attempted
    Completed { urls: Vec<String> },
    /// Run aborted
    Fatal { reason: String, urls: Vec<String> },
}

#[derive(Serialize)]
struct PreparingPayload<'a> {
    status: CallbackStatus,
    #[serde(flatten)]
    snapshot: &'a RunSnapshot,
}

#[derive(Serialize)]
struct ItemFailedPayload<'a> {
    status: CallbackStatus,
    type_error: ErrorKind,
    failed_reason: &'a str,
    current_index: usize,
    current_prompt: &'a str,
    video_urls: &'a [String],
}

#[derive(Serialize)]
struct UploadPayload<'a> {
    status: CallbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_reason: Option<&'a str>,
    current_index: usize,
    video_url: &'a str,
    video_urls: &'a [String],
}

#[derive(Serialize)]
struct ProgressPayload<'a> {
    status: CallbackStatus,
    current_index: usize,
    current_prompt: &'a str,
    current_url: Option<&'a str>,
    video_urls: &'a [String],
}

#[derive(Serialize)]
struct CompletedPayload<'a> {
    status: CallbackStatus,
    video_urls: &'a [String],
}

#[derive(Serialize)]
struct FatalPayload<'a> {
    status: CallbackStatus,
    type_error: ErrorKind,
    failed_reason: &'a str,
    video_urls: &'a [String],
}

impl CallbackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CallbackEvent::Preparing(_) => EventKind::Preparing,
            CallbackEvent::ItemFailed { .. } => EventKind::ItemFailure,
            CallbackEvent::UploadSucceeded { .. } | CallbackEvent::UploadFailed { .. } => {
                EventKind::UploadResult
            }
            CallbackEvent::Progress { .. } => EventKind::Progress,
            CallbackEvent::Completed { .. } => EventKind::TerminalSuccess,
            CallbackEvent::Fatal { .. } => EventKind::TerminalFailure,
        }
    }

    /// Item index the event refers to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            CallbackEvent::ItemFailed { index, .. }
            | CallbackEvent::UploadSucceeded { index, .. }
            | CallbackEvent::UploadFailed { index, .. }
            | CallbackEvent::Progress { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// JSON body, with the job id under `job_id_field` where the event carries it.
    pub fn payload(&self, job_id_field: &str) -> serde_json::Result<Value> {
        match self {
            CallbackEvent::Preparing(snapshot) => {
                let mut value = serde_json::to_value(PreparingPayload {
                    status: CallbackStatus::PreparingProcessing,
                    snapshot,
                })?;
                if let Value::Object(map) = &mut value {
                    map.insert(job_id_field.to_string(), Value::String(snapshot.job_id.clone()));
                }
                Ok(value)
            }
            CallbackEvent::ItemFailed {
                index,
                prompt,
                reason,
                urls,
            } => serde_json::to_value(ItemFailedPayload {
                status: CallbackStatus::Failed,
                type_error: ErrorKind::GenerateFailed,
                failed_reason: reason,
                current_index: *index,
                current_prompt: prompt,
                video_urls: urls,
            }),
            CallbackEvent::UploadSucceeded { index, url, urls } => {
                serde_json::to_value(UploadPayload {
                    status: CallbackStatus::Success,
                    failed_reason: None,
                    current_index: *index,
                    video_url: url,
                    video_urls: urls,
                })
            }
            CallbackEvent::UploadFailed { index, reason, urls } => {
                serde_json::to_value(UploadPayload {
                    status: CallbackStatus::Failed,
                    failed_reason: Some(reason),
                    current_index: *index,
                    video_url: "",
                    video_urls: urls,
                })
            }
            CallbackEvent::Progress {
                index,
                prompt,
                current_url,
                urls,
            } => serde_json::to_value(ProgressPayload {
                status: CallbackStatus::Generating,
                current_index: *index,
                current_prompt: prompt,
                current_url: current_url.as_deref(),
                video_urls: urls,
            }),
            CallbackEvent::Completed { urls } => serde_json::to_value(CompletedPayload {
                status: CallbackStatus::Completed,
                video_urls: urls,
            }),
            CallbackEvent::Fatal { reason, urls } => serde_json::to_value(FatalPayload {
                status: CallbackStatus::Failed,
                type_error: ErrorKind::FatalError,
                failed_reason: reason,
                video_urls: urls,
            }),
        }
    }
}
