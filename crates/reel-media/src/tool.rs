//! The media tool seam used by normalization.

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_duration;

/// Operations the normalizer needs from a media toolchain.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Container duration in seconds.
    async fn probe_duration(&self, input: &Path) -> MediaResult<f64>;

    /// Stream-copy at most `seconds` of `input` to `output`.
    async fn truncate_copy(&self, input: &Path, output: &Path, seconds: u32) -> MediaResult<()>;

    /// Play `input` plus `loops` repetitions, re-encoded and cut to `seconds`.
    async fn loop_trim(&self, input: &Path, output: &Path, loops: u32, seconds: u32) -> MediaResult<()>;

    /// Byte-for-byte copy.
    async fn copy(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// `MediaTool` backed by the FFmpeg/FFprobe CLIs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTool {
    runner: FfmpegRunner,
}

impl FfmpegTool {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, input: &Path) -> MediaResult<f64> {
        probe_duration(input).await
    }

    async fn truncate_copy(&self, input: &Path, output: &Path, seconds: u32) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .duration(f64::from(seconds))
            .codec_copy();
        self.runner.run(&cmd).await
    }

    async fn loop_trim(&self, input: &Path, output: &Path, loops: u32, seconds: u32) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .stream_loop(loops)
            .duration(f64::from(seconds))
            .video_codec("libx264")
            .pixel_format("yuv420p");
        self.runner.run(&cmd).await
    }

    async fn copy(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let bytes = tokio::fs::copy(input, output).await?;
        info!("Copied {} bytes: {} -> {}", bytes, input.display(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_is_verbatim() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.mp4");
        let dst = dir.path().join("out.mp4");
        tokio::fs::write(&src, b"\x00\x00\x00\x18ftypmp42").await.unwrap();

        FfmpegTool::default().copy(&src, &dst).await.unwrap();

        assert_eq!(
            tokio::fs::read(&dst).await.unwrap(),
            tokio::fs::read(&src).await.unwrap()
        );
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and ffprobe"]
    async fn test_truncate_copy_real_clip() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.mp4");
        let dst = dir.path().join("dst.mp4");

        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=15:size=320x240:rate=25"])
            .arg(&src)
            .status()
            .await
            .unwrap();
        assert!(status.success());

        let tool = FfmpegTool::default();
        tool.truncate_copy(&src, &dst, 10).await.unwrap();

        let duration = tool.probe_duration(&dst).await.unwrap();
        assert!((duration - 10.0).abs() <= 0.5);
    }
}
