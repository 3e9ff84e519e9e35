//! Text-to-speech (TTS) templating and synthesis

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::TtsParam;
use crate::db::{Interval, TranscriptStore};
use crate::{Error, Result};

/// Fetches synthesized audio for a text and a prepared voice query
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` using the `key=v1,v2&...` voice `query`
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, query: &str) -> Result<Vec<u8>>;
}

/// Synthesizer issuing a GET against an HTTP TTS endpoint
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    url: String,
    text_param: String,
}

impl HttpSpeechSynthesizer {
    /// Create a new synthesizer for `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(url: String, text_param: String, timeout: Duration) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::Config("TTS URL required".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            text_param,
        })
    }

    /// Full request URL for a text and voice query
    fn request_url(&self, text: &str, query: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{separator}{}={}",
            self.url,
            self.text_param,
            urlencoding::encode(text)
        );
        if !query.is_empty() {
            url.push('&');
            url.push_str(query);
        }
        url
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str, query: &str) -> Result<Vec<u8>> {
        let url = self.request_url(text, query);
        tracing::debug!(url = %url, "requesting synthesis");

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "TTS request failed");
            if e.is_timeout() {
                Error::Timeout(format!("tts: {e}"))
            } else {
                Error::Tts(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(Error::Tts("TTS returned no audio".to_string()));
        }
        Ok(audio.to_vec())
    }
}

/// Map client voice values onto the TTS query grammar
///
/// Values for parameters sharing a `url_param` are comma-joined. Both the
/// keys and the values within a key follow `params` declaration order.
/// Values with no configured parameter, and nulls, are ignored.
#[must_use]
pub fn build_query(params: &[TtsParam], voice_params: &Map<String, Value>) -> String {
    let mut buckets: Vec<(&str, Vec<String>)> = Vec::new();

    for param in params {
        let value = match voice_params.get(&param.name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let encoded = urlencoding::encode(&value).into_owned();

        if let Some((_, values)) = buckets
            .iter_mut()
            .find(|(key, _)| *key == param.url_param)
        {
            values.push(encoded);
        } else {
            buckets.push((param.url_param.as_str(), vec![encoded]));
        }
    }

    buckets
        .iter()
        .map(|(key, values)| format!("{key}={}", values.join(",")))
        .collect::<Vec<_>>()
        .join("&")
}

/// Turns text plus voice controls into a published audio artifact
pub struct SynthesisTemplater {
    params: Vec<TtsParam>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: TranscriptStore,
    audio_dir: PathBuf,
    public_url: String,
}

impl SynthesisTemplater {
    /// Create a new templater
    #[must_use]
    pub fn new(
        params: Vec<TtsParam>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: TranscriptStore,
        audio_dir: PathBuf,
        public_url: String,
    ) -> Self {
        Self {
            params,
            synthesizer,
            store,
            audio_dir,
            public_url,
        }
    }

    /// Synthesize `text`, publish the audio, and return its URL
    ///
    /// The text is recorded as a synthesized utterance; a storage failure
    /// there is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns error if the TTS service fails or the audio cannot be written
    pub async fn synthesize(
        &self,
        text: &str,
        voice_params: &Map<String, Value>,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::InvalidRequest("nothing to synthesize".to_string()));
        }

        let query = build_query(&self.params, voice_params);
        tracing::info!(query = %query, chars = text.chars().count(), "synthesizing");

        let audio = self.synthesizer.synthesize(text, &query).await?;

        let file_name = format!("{}.wav", uuid::Uuid::new_v4());
        let path = self.write_artifact(&file_name, &audio).await?;
        let audio_url = format!("{}/audio/{file_name}", self.public_url);

        if let Err(e) =
            self.store
                .append_utterance(text, &audio_url, true, Interval::instant(Utc::now()))
        {
            tracing::error!(error = %e, "failed to save synthesized utterance");
        }

        tracing::info!(path = %path.display(), url = %audio_url, "synthesized audio published");
        Ok(audio_url)
    }

    /// Write audio under its final name only once fully on disk
    async fn write_artifact(&self, file_name: &str, audio: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;

        let dir = self.audio_dir.clone();
        let target = self.audio_dir.join(file_name);
        let audio = audio.to_vec();
        let final_path = target.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&audio)?;
            tmp.persist(&target).map_err(|e| Error::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Tts(format!("artifact write task failed: {e}")))??;

        Ok(final_path)
    }
}
