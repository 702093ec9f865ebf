//! Batch text-to-video runner.
//!
//! This crate provides:
//! - Run configuration loaded once from the environment
//! - The generation backend seam and its process implementation
//! - The batch orchestrator: generate, normalize, upload, report
//! - Structured job logging and optional bounded retries

pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod orchestrator;
pub mod retry;

pub use config::{RunConfig, WorkerSettings};
pub use error::{FailureKind, WorkerError, WorkerResult};
pub use generation::{GenerationInvoker, WanInvoker};
pub use logging::JobLogger;
pub use orchestrator::{BatchOrchestrator, Collaborators, ItemPaths, RunReport, PLACEHOLDER_MARKER};
pub use retry::RetryConfig;
