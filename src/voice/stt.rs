//! Speech-to-text (STT) via an external transcription service

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Response from the transcription service
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TranscriptionResult {
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
}

/// A timed span of transcribed speech, offsets in seconds from request time
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TranscriptionSegment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

impl TranscriptionSegment {
    /// Convenience constructor
    #[must_use]
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Transcribes a WAV file into timed segments
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the WAV file at `wav`
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or answers badly
    async fn transcribe(&self, wav: &Path) -> Result<TranscriptionResult>;
}

/// Transcriber posting a multipart upload to an HTTP endpoint
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriber {
    /// Create a new transcriber for `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::Config("transcription URL required".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, wav: &Path) -> Result<TranscriptionResult> {
        let audio = tokio::fs::read(wav).await?;
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let file_name = wav
            .file_name()
            .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned());
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(audio)
                .file_name(file_name)
                .mime_str("audio/wav")
                .map_err(|e| Error::Stt(e.to_string()))?,
        );

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                if e.is_timeout() {
                    Error::Timeout(format!("transcription: {e}"))
                } else {
                    Error::Stt(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription service error");
            return Err(Error::Stt(format!("transcription error {status}: {body}")));
        }

        let result: TranscriptionResult = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            Error::Stt(format!("malformed transcription response: {e}"))
        })?;

        tracing::info!(segments = result.segments.len(), "transcription complete");
        Ok(result)
    }
}
