//! Terminal run summary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ItemResult;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every item was attempted (per-item failures included)
    Completed,
    /// An unclassified failure stopped the batch
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Failed => 1,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary derived from the results list once the run ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Uploaded artifact URLs in index order (failed uploads leave no entry)
    pub urls: Vec<String>,
    /// Terminal status
    pub status: RunStatus,
    /// Reason the run failed
    pub failure_reason: Option<String>,
}

impl RunSummary {
    /// Derive a summary from the results list and an optional fatal error.
    pub fn from_results(results: &[ItemResult], fatal: Option<String>) -> Self {
        let mut ordered: Vec<&ItemResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.index);

        let urls = ordered
            .iter()
            .filter_map(|r| r.artifact_url.clone())
            .collect();

        let status = if fatal.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        Self {
            urls,
            status,
            failure_reason: fatal,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
