//! Inbound audio payload decoding

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;

use super::transcode::Transcoder;
use crate::{Error, Result};

/// Turns a base64 data-URL payload into a canonical WAV artifact on disk
pub struct AudioIngest {
    audio_dir: PathBuf,
    transcoder: Arc<dyn Transcoder>,
}

impl AudioIngest {
    /// Create an ingest writing artifacts into `audio_dir`
    #[must_use]
    pub fn new(audio_dir: PathBuf, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            audio_dir,
            transcoder,
        }
    }

    /// Decode, transcode and store a payload, returning the WAV path
    ///
    /// Intermediate files are temp files, so a failed or cancelled call
    /// leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid base64 audio or transcoding fails
    pub async fn decode(&self, payload: &str) -> Result<PathBuf> {
        let bytes = decode_payload(payload)?;
        tokio::fs::create_dir_all(&self.audio_dir).await?;

        let stem = unique_stem();
        let compressed = tempfile::Builder::new()
            .prefix(&stem)
            .suffix(".webm")
            .tempfile_in(&self.audio_dir)?;
        tokio::fs::write(compressed.path(), &bytes).await?;

        let converted = tempfile::Builder::new()
            .prefix(&stem)
            .suffix(".wav")
            .tempfile_in(&self.audio_dir)?;

        self.transcoder
            .to_wav(compressed.path(), converted.path())
            .await?;
        let seconds = validate_wav(converted.path())?;

        let output = self.audio_dir.join(format!("{stem}.wav"));
        converted
            .persist(&output)
            .map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            path = %output.display(),
            payload_bytes = bytes.len(),
            seconds,
            "audio payload stored as WAV"
        );
        Ok(output)
    }
}

/// Strip the data-URL header, repair base64 padding, and decode
///
/// Payloads without a comma are treated as bare base64.
///
/// # Errors
///
/// Returns error if the body is not valid base64 or decodes to nothing
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let body = payload.split_once(',').map_or(payload, |(_, body)| body);
    let mut body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let missing = body.len() % 4;
    if missing != 0 {
        body.push_str(&"=".repeat(4 - missing));
    }

    let bytes = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| Error::Decode(format!("invalid base64 audio: {e}")))?;

    if bytes.is_empty() {
        return Err(Error::Decode("empty audio payload".to_string()));
    }

    Ok(bytes)
}

/// `audio_<timestamp>_<random8>`, unique across concurrent calls
fn unique_stem() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "audio_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

/// Confirm the transcoder produced a readable WAV; returns its duration in seconds
fn validate_wav(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| Error::Transcode(format!("transcoder output is not WAV: {e}")))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(Error::Transcode("WAV reports zero sample rate".to_string()));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}
