//! Artifact store seam.

use async_trait::async_trait;
use std::path::Path;

use crate::client::S3Client;
use crate::error::StorageResult;

/// Content type of every uploaded artifact.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Durable storage for normalized clips.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store the file at `path` under `key`, publicly readable.
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<()>;
}

#[async_trait]
impl ArtifactStore for S3Client {
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<()> {
        self.upload_public_file(path, key, VIDEO_CONTENT_TYPE).await
    }
}
