//! FFmpeg CLI wrapper for clip normalization.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with timeout and captured stderr
//! - Duration probing via FFprobe
//! - The `MediaTool` seam and its FFmpeg implementation
//! - Duration normalization (truncate, trim, loop-then-trim, copy)
//! - Cross-device file moves

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod normalize;
pub mod probe;
pub mod tool;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_if_exists};
pub use normalize::{loop_count, plan_normalization, DurationNormalizer, NormalizationPlan, DURATION_TOLERANCE};
pub use probe::probe_duration;
pub use tool::{FfmpegTool, MediaTool};
