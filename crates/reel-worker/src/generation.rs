//! Generation backend.
//!
//! The orchestrator only sees the `GenerationInvoker` seam. `WanInvoker`
//! runs the Wan2.1 generation script as a child process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use reel_media::{move_file, remove_if_exists};
use reel_models::GenerationParams;

use crate::error::{WorkerError, WorkerResult};

/// Lines of stderr kept in a failure reason.
const STDERR_TAIL_LINES: usize = 10;

/// Produces one clip for one prompt.
#[async_trait]
pub trait GenerationInvoker: Send + Sync {
    /// Generate a clip for `prompt` and place it at `dest`.
    ///
    /// Every failure of the backend itself is a `GenerationFailed` error.
    async fn run(&self, prompt: &str, params: &GenerationParams, dest: &Path) -> WorkerResult<PathBuf>;
}

/// Runs `<python> <script> --task --size --ckpt_dir --prompt` in the project directory.
#[derive(Debug, Clone, Default)]
pub struct WanInvoker {
    timeout: Option<Duration>,
}

impl WanInvoker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Argument vector passed to the interpreter.
    pub fn build_args(prompt: &str, params: &GenerationParams) -> Vec<String> {
        vec![
            params.script.clone(),
            "--task".to_string(),
            params.task.clone(),
            "--size".to_string(),
            params.size.clone(),
            "--ckpt_dir".to_string(),
            params.ckpt_dir.display().to_string(),
            "--prompt".to_string(),
            prompt.to_string(),
        ]
    }

    /// Check the interpreter is on `PATH`.
    pub fn check_available(params: &GenerationParams) -> WorkerResult<PathBuf> {
        which::which(&params.python_bin).map_err(|_| {
            WorkerError::config_error(format!("{} not found in PATH", params.python_bin))
        })
    }
}

#[async_trait]
impl GenerationInvoker for WanInvoker {
    async fn run(&self, prompt: &str, params: &GenerationParams, dest: &Path) -> WorkerResult<PathBuf> {
        let produced = params.produced_path();

        // A stale output from an earlier item must not pass as this one
        remove_if_exists(&produced).await.map_err(|e| {
            WorkerError::generation_failed(format!("failed to clear stale output: {}", e))
        })?;

        let args = Self::build_args(prompt, params);
        debug!("Running generation: {} {}", params.python_bin, args.join(" "));

        let child = Command::new(&params.python_bin)
            .args(&args)
            .current_dir(&params.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WorkerError::generation_failed(format!("failed to spawn {}: {}", params.python_bin, e))
            })?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Generation timed out after {:?}, killing process", limit);
                    return Err(WorkerError::generation_failed(format!(
                        "generation timed out after {}s",
                        limit.as_secs()
                    )));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| WorkerError::generation_failed(format!("generation process error: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().collect();
            let start = tail.len().saturating_sub(STDERR_TAIL_LINES);
            return Err(WorkerError::generation_failed(format!(
                "generation exited with {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                tail[start..].join("\n")
            )));
        }

        if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            return Err(WorkerError::generation_failed(format!(
                "generation produced no output at {}",
                produced.display()
            )));
        }

        move_file(&produced, dest)
            .await
            .map_err(|e| WorkerError::generation_failed(format!("failed to collect output: {}", e)))?;

        info!("Generated clip at {}", dest.display());
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params(project: &Path, python_bin: &str) -> GenerationParams {
        GenerationParams {
            project_dir: project.to_path_buf(),
            python_bin: python_bin.to_string(),
            ..GenerationParams::default()
        }
    }

    #[test]
    fn test_build_args() {
        let args = WanInvoker::build_args("a cat; rm -rf /", &GenerationParams::default());
        assert_eq!(
            args,
            vec![
                "generate.py",
                "--task",
                "t2v-1.3B",
                "--size",
                "832*480",
                "--ckpt_dir",
                "/root/models/Wan2.1-T2V-1.3B",
                "--prompt",
                "a cat; rm -rf /",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_generation_failure() {
        let dir = TempDir::new().unwrap();
        let params = params(dir.path(), "reel-no-such-interpreter");

        let err = WanInvoker::default()
            .run("a cat", &params, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::GenerationFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_output_is_generation_failure() {
        // `true` ignores its arguments and exits 0 without writing anything
        let dir = TempDir::new().unwrap();
        let params = params(dir.path(), "true");

        let err = WanInvoker::default()
            .run("a cat", &params, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_generation_failure() {
        let dir = TempDir::new().unwrap();
        let params = params(dir.path(), "false");

        let err = WanInvoker::default()
            .run("a cat", &params, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::GenerationFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_output_is_removed() {
        let dir = TempDir::new().unwrap();
        let params = params(dir.path(), "true");
        tokio::fs::write(params.produced_path(), b"old").await.unwrap();

        let result = WanInvoker::default()
            .run("a cat", &params, &dir.path().join("out.mp4"))
            .await;
        assert!(result.is_err());
        assert!(!params.produced_path().exists());
    }
}
