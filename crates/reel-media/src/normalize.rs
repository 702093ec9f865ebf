//! Clip duration normalization.
//!
//! Every clip in a batch must play for exactly the target duration. The
//! normalizer probes the input and picks one of four plans:
//!
//! | probed duration `D` | plan |
//! |---|---|
//! | `D <= 0.1` (or probe failed) | truncating stream copy |
//! | `D > T + 0.1` | stream-copy trim to `T` |
//! | `D < T - 0.1` | loop `loop_count(T, D)` times, re-encode, trim to `T` |
//! | otherwise | verbatim copy |

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::MediaResult;
use crate::tool::MediaTool;

/// Tolerance in seconds on both sides of the target.
pub const DURATION_TOLERANCE: f64 = 0.1;

/// Corrective transform chosen for one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationPlan {
    /// Duration unknown or degenerate: best-effort truncating copy
    TruncateCopy,
    /// Too long: lossless cut to the target
    Trim,
    /// Too short: loop, re-encode, cut to the target
    LoopTrim { loops: u32 },
    /// Already within tolerance
    Copy,
}

impl fmt::Display for NormalizationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationPlan::TruncateCopy => write!(f, "truncate_copy"),
            NormalizationPlan::Trim => write!(f, "trim"),
            NormalizationPlan::LoopTrim { loops } => write!(f, "loop_trim(x{})", loops),
            NormalizationPlan::Copy => write!(f, "copy"),
        }
    }
}

/// Repetitions needed to cover `target` with a clip of `duration` seconds.
///
/// `max(1, floor(target / max(duration, 1)))`.
pub fn loop_count(target: u32, duration: f64) -> u32 {
    let per_loop = duration.max(1.0);
    let count = (f64::from(target) / per_loop).floor();
    // count <= target, so the cast cannot truncate
    (count as u32).max(1)
}

/// Choose the plan for a clip of `duration` seconds and a `target`.
pub fn plan_normalization(duration: f64, target: u32) -> NormalizationPlan {
    let target_f = f64::from(target);

    if !duration.is_finite() || duration <= DURATION_TOLERANCE {
        NormalizationPlan::TruncateCopy
    } else if duration > target_f + DURATION_TOLERANCE {
        NormalizationPlan::Trim
    } else if duration < target_f - DURATION_TOLERANCE {
        NormalizationPlan::LoopTrim {
            loops: loop_count(target, duration),
        }
    } else {
        NormalizationPlan::Copy
    }
}

/// Applies the normalization plan through a `MediaTool`.
#[derive(Clone)]
pub struct DurationNormalizer {
    tool: Arc<dyn MediaTool>,
}

impl DurationNormalizer {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self { tool }
    }

    /// Normalize `input` into `output` so it lasts `target` seconds.
    ///
    /// A failed probe counts as an unknown duration. Failures of the
    /// transform itself are returned to the caller.
    pub async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        target: u32,
    ) -> MediaResult<NormalizationPlan> {
        let duration = match self.tool.probe_duration(input).await {
            Ok(d) => d,
            Err(e) => {
                debug!("Probe failed for {}, treating as unknown duration: {}", input.display(), e);
                0.0
            }
        };

        let plan = plan_normalization(duration, target);
        info!(
            "Normalizing {} ({:.2}s -> {}s) via {}",
            input.display(),
            duration,
            target,
            plan
        );

        match plan {
            NormalizationPlan::TruncateCopy | NormalizationPlan::Trim => {
                self.tool.truncate_copy(input, output, target).await?
            }
            NormalizationPlan::LoopTrim { loops } => {
                self.tool.loop_trim(input, output, loops, target).await?
            }
            NormalizationPlan::Copy => self.tool.copy(input, output).await?,
        }

        Ok(plan)
    }
}
