//! Per-item results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage outcome of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The backend produced a clip
    Generated,
    /// The backend failed; a placeholder stood in
    GenerationFailed,
    /// The normalized clip was stored
    Uploaded,
    /// Normalization or storage failed; no URL recorded
    UploadFailed,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Generated => "generated",
            ItemOutcome::GenerationFailed => "generation_failed",
            ItemOutcome::Uploaded => "uploaded",
            ItemOutcome::UploadFailed => "upload_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::GenerationFailed | ItemOutcome::UploadFailed)
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of processing one prompt.
///
/// Created when the item starts, then the generation outcome is settled,
/// then the upload outcome. It is not touched after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    /// 0-based position in the prompt list
    pub index: usize,
    /// Prompt text
    pub prompt: String,
    /// `Generated` or `GenerationFailed`, once settled
    pub generation: Option<ItemOutcome>,
    /// `Uploaded` or `UploadFailed`, once settled
    pub upload: Option<ItemOutcome>,
    /// Public URL, present only when `upload == Some(Uploaded)`
    pub artifact_url: Option<String>,
    /// Generation error message
    pub generation_error: Option<String>,
    /// Normalization or upload error message
    pub upload_error: Option<String>,
}

impl ItemResult {
    /// Start a result for the item at `index`.
    pub fn started(index: usize, prompt: impl Into<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
            generation: None,
            upload: None,
            artifact_url: None,
            generation_error: None,
            upload_error: None,
        }
    }

    pub fn mark_generated(&mut self) {
        debug_assert!(self.generation.is_none());
        self.generation = Some(ItemOutcome::Generated);
    }

    pub fn mark_generation_failed(&mut self, reason: impl Into<String>) {
        debug_assert!(self.generation.is_none());
        self.generation = Some(ItemOutcome::GenerationFailed);
        self.generation_error = Some(reason.into());
    }

    pub fn mark_uploaded(&mut self, url: impl Into<String>) {
        debug_assert!(self.generation.is_some() && self.upload.is_none());
        self.upload = Some(ItemOutcome::Uploaded);
        self.artifact_url = Some(url.into());
    }

    pub fn mark_upload_failed(&mut self, reason: impl Into<String>) {
        debug_assert!(self.generation.is_some() && self.upload.is_none());
        self.upload = Some(ItemOutcome::UploadFailed);
        self.upload_error = Some(reason.into());
    }

    /// Latest settled outcome.
    pub fn outcome(&self) -> Option<ItemOutcome> {
        self.upload.or(self.generation)
    }

    /// Whether both stages have been settled.
    pub fn is_settled(&self) -> bool {
        self.generation.is_some() && self.upload.is_some()
    }
}
