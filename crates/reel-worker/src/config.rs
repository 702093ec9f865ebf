//! Run configuration.
//!
//! The environment is read exactly once, here. Everything downstream
//! receives the resulting immutable `RunConfig`.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use std::str::FromStr;
use tracing::{error, warn};

use reel_models::job::{date_path, default_prefix};
use reel_models::{
    decode_prompts, CallbackAuth, CallbackPathStyle, CallbackSettings, GenerationParams, JobSpec,
    StorageLocation,
};
use reel_storage::S3Config;

use crate::error::{WorkerError, WorkerResult};

/// Encoded empty prompt list (`[]`).
const EMPTY_PROMPTS_B64: &str = "W10=";

/// Runner settings outside the job specification.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Directory for intermediate clip files
    pub work_dir: PathBuf,
    /// Pause between items
    pub item_delay: Duration,
    /// Timeout for one generation run
    pub generation_timeout: Option<Duration>,
    /// Timeout for one FFmpeg run, in seconds
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Extra generation attempts per item
    pub generation_retries: u32,
    /// Extra upload attempts per item
    pub upload_retries: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp"),
            item_delay: Duration::from_secs(3),
            generation_timeout: None,
            ffmpeg_timeout_secs: Some(600),
            generation_retries: 0,
            upload_retries: 0,
        }
    }
}

/// Everything a run needs, resolved at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub spec: JobSpec,
    pub storage: S3Config,
    pub settings: WorkerSettings,
}

impl RunConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), Utc::now())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, now: DateTime<Utc>) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let job_id = var("GENERATE_NUMBER")
            .or_else(|| var("JOB_ID"))
            .unwrap_or_else(|| "gv_unknown".to_string());

        let target_duration = match var("TARGET_DURATION") {
            Some(raw) => parse_target_duration(&raw)?,
            None => 10,
        };

        let date_path = date_path(now);
        let prefix = var("UPLOAD_BASE_PATH").unwrap_or_else(|| default_prefix(&date_path, &job_id));

        let bucket = var("S3_BUCKET").unwrap_or_default();
        let storage = S3Config::new(
            &var("S3_ENDPOINT").unwrap_or_default(),
            var("S3_ACCESS_KEY").unwrap_or_default(),
            var("S3_SECRET_KEY").unwrap_or_default(),
            bucket.clone(),
            var("S3_REGION").unwrap_or_else(|| "auto".to_string()),
        );

        let defaults = GenerationParams::default();
        let generation = GenerationParams {
            task: var("WAN_TASK").unwrap_or(defaults.task),
            size: var("WAN_SIZE").unwrap_or(defaults.size),
            ckpt_dir: var("CKPT_DIR").map(PathBuf::from).unwrap_or(defaults.ckpt_dir),
            project_dir: var("PROJECT_DIR").map(PathBuf::from).unwrap_or(defaults.project_dir),
            script: var("GENERATE_SCRIPT").unwrap_or(defaults.script),
            python_bin: var("PYTHON_BIN").unwrap_or(defaults.python_bin),
            output_file: var("GENERATE_OUTPUT").unwrap_or(defaults.output_file),
        };

        let prompts_b64 = var("PROMPTS_B64").unwrap_or_else(|| EMPTY_PROMPTS_B64.to_string());
        let prompts = decode_prompts(&prompts_b64).unwrap_or_else(|e| {
            error!("Failed to decode PROMPTS_B64: {}", e);
            Vec::new()
        });

        let callback = match var("CALLBACK_URL") {
            Some(endpoint) => Some(callback_settings(endpoint, &var)?),
            None => None,
        };

        let spec = JobSpec {
            job_id,
            target_duration,
            prompts,
            generation,
            storage: StorageLocation::new(bucket, prefix),
            public_base_url: var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            callback,
            date_path,
        };

        let defaults = WorkerSettings::default();
        let settings = WorkerSettings {
            work_dir: var("WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
            item_delay: parse_var(&var, "ITEM_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.item_delay),
            generation_timeout: parse_var(&var, "GENERATION_TIMEOUT_SECS").map(Duration::from_secs),
            ffmpeg_timeout_secs: parse_var(&var, "FFMPEG_TIMEOUT_SECS")
                .or(defaults.ffmpeg_timeout_secs),
            generation_retries: parse_var(&var, "GENERATION_RETRIES")
                .unwrap_or(defaults.generation_retries),
            upload_retries: parse_var(&var, "UPLOAD_RETRIES").unwrap_or(defaults.upload_retries),
        };

        Ok(Self {
            spec,
            storage,
            settings,
        })
    }
}

/// Parse an optional numeric variable, warning when it is set but malformed.
fn parse_var<F, T>(var: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}

fn parse_target_duration(raw: &str) -> WorkerResult<u32> {
    match raw.parse::<u32>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(WorkerError::config_error(format!(
            "TARGET_DURATION must be a positive integer, got {:?}",
            raw
        ))),
    }
}

fn callback_settings<F>(endpoint: String, var: &F) -> WorkerResult<CallbackSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let path_style = match var("CALLBACK_PATH_STYLE") {
        Some(raw) => CallbackPathStyle::parse(&raw).ok_or_else(|| {
            WorkerError::config_error(format!("unknown CALLBACK_PATH_STYLE {:?}", raw))
        })?,
        None => CallbackPathStyle::Flat,
    };

    let auth = match var("CALLBACK_API_KEY") {
        None => CallbackAuth::None,
        Some(key) => match var("CALLBACK_AUTH_STYLE").as_deref().unwrap_or("header") {
            "header" => CallbackAuth::Header {
                name: var("CALLBACK_AUTH_HEADER").unwrap_or_else(|| "key".to_string()),
                value: key,
            },
            "bearer" => CallbackAuth::Bearer { token: key },
            other => {
                return Err(WorkerError::config_error(format!(
                    "unknown CALLBACK_AUTH_STYLE {:?}",
                    other
                )))
            }
        },
    };

    let mut settings = CallbackSettings::new(endpoint)
        .with_path_style(path_style)
        .with_auth(auth);

    if let Some(field) = var("CALLBACK_JOB_ID_FIELD") {
        settings = settings.with_job_id_field(field);
    }
    if let Some(secs) = parse_var(var, "CALLBACK_TIMEOUT_SECS") {
        settings = settings.with_timeout(Duration::from_secs(secs));
    }

    Ok(settings)
}
