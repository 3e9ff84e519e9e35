//! Compressed-to-WAV conversion

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::{Error, Result};

/// Sample rate of the canonical WAV handed to transcription
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;

/// Converts a compressed audio container into canonical WAV
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read `input` and write mono 16 kHz WAV to `output`
    ///
    /// # Errors
    ///
    /// Returns error if the input cannot be converted
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Transcoder backed by an `ffmpeg` child process
pub struct FfmpegTranscoder {
    program: PathBuf,
    deadline: Duration,
}

impl FfmpegTranscoder {
    /// Create a transcoder running `program` with a per-conversion deadline
    #[must_use]
    pub const fn new(program: PathBuf, deadline: Duration) -> Self {
        Self { program, deadline }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        let rate = CANONICAL_SAMPLE_RATE.to_string();
        let child = Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ac", "1", "-ar", &rate, "-f", "wav"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transcode(format!("failed to start ffmpeg: {e}")))?;

        // Wait for completion with timeout; dropping the child kills it
        let output_status = timeout(self.deadline, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(format!("ffmpeg after {:?}", self.deadline)))?
            .map_err(|e| Error::Transcode(format!("ffmpeg execution failed: {e}")))?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(Error::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output_status.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Whether `program` resolves to an executable
#[must_use]
pub fn ffmpeg_available(program: &Path) -> bool {
    which::which(program).is_ok()
}
