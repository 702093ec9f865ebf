//! Shared data models for the PromptReel batch runner.
//!
//! This crate provides Serde-serializable types for:
//! - The immutable job specification and its generation parameters
//! - Callback dialect settings (path shape, auth style, job id field)
//! - Per-item results and the derived run summary
//! - Prompt list decoding

pub mod callback;
pub mod item;
pub mod job;
pub mod prompts;
pub mod summary;

// Re-export common types
pub use callback::{CallbackAuth, CallbackPathStyle, CallbackSettings};
pub use item::{ItemOutcome, ItemResult};
pub use job::{GenerationParams, JobSpec, StorageLocation};
pub use prompts::{decode_prompts, PromptDecodeError};
pub use summary::{RunStatus, RunSummary};
