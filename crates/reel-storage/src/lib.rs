//! S3-compatible object storage client.
//!
//! This crate provides:
//! - Public-read file upload to any S3-compatible endpoint
//! - The `ArtifactStore` seam the batch runner uploads through

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use store::{ArtifactStore, VIDEO_CONTENT_TYPE};
