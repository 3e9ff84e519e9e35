//! The concrete request handlers wired to storage and external services

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::Result;
use crate::completion::{CompletionEngine, OpenAiChatModel};
use crate::config::Config;
use crate::context::ContextWindow;
use crate::db::TranscriptStore;
use crate::router::Handlers;
use crate::voice::{
    AudioIngest, FfmpegTranscoder, HttpSpeechSynthesizer, HttpTranscriber, SegmentMerger,
    SynthesisTemplater, Transcriber,
};

/// Returned when an audio payload cannot be decoded or transcoded
pub const NO_SPEECH_DETECTED: &str = "No speech detected in the audio segment.";

/// Returned when the transcription service fails
pub const TRANSCRIPTION_FAILED: &str = "Error transcribing audio.";

/// Handlers backed by the transcript store and the external services
pub struct Pipeline {
    store: TranscriptStore,
    ingest: AudioIngest,
    transcriber: Arc<dyn Transcriber>,
    merger: SegmentMerger,
    completion: CompletionEngine,
    templater: SynthesisTemplater,
    language: String,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        store: TranscriptStore,
        ingest: AudioIngest,
        transcriber: Arc<dyn Transcriber>,
        completion: CompletionEngine,
        templater: SynthesisTemplater,
        language: String,
    ) -> Self {
        Self {
            merger: SegmentMerger::new(store.clone()),
            store,
            ingest,
            transcriber,
            completion,
            templater,
            language,
        }
    }

    /// Wire the HTTP service clients and `ffmpeg` from configuration
    ///
    /// # Errors
    ///
    /// Returns error if a service URL is missing or an HTTP client cannot be built
    pub fn from_config(config: &Config, store: TranscriptStore) -> Result<Self> {
        let transcoder = Arc::new(FfmpegTranscoder::new(
            config.audio.ffmpeg_path.clone(),
            config.audio.transcode_timeout,
        ));
        let ingest = AudioIngest::new(config.server.audio_dir.clone(), transcoder);

        let transcriber = Arc::new(HttpTranscriber::new(
            config.transcription.url.clone(),
            config.transcription.timeout,
        )?);

        let completion = CompletionEngine::new(
            Arc::new(OpenAiChatModel::from_config(&config.llm)?),
            ContextWindow::new(store.clone(), config.context.clone()),
            config.llm.persona_prompt.clone(),
            config.llm.candidates,
            config.llm.temperature,
        );

        let synthesizer = Arc::new(HttpSpeechSynthesizer::new(
            config.tts.url.clone(),
            config.tts.text_param.clone(),
            config.tts.timeout,
        )?);
        let templater = SynthesisTemplater::new(
            config.tts.params.clone(),
            synthesizer,
            store.clone(),
            config.server.audio_dir.clone(),
            config.server.public_url.clone(),
        );

        Ok(Self::new(
            store,
            ingest,
            transcriber,
            completion,
            templater,
            config.transcription.language.clone(),
        ))
    }
}

#[async_trait]
impl Handlers for Pipeline {
    async fn predict(&self, text: &str) -> Result<Vec<String>> {
        self.completion.complete(text, Utc::now()).await
    }

    async fn synthesise(&self, text: &str, voice_params: &Map<String, Value>) -> Result<String> {
        self.templater.synthesize(text, voice_params).await
    }

    async fn autocomplete(&self, input: &str) -> Vec<String> {
        crate::autocomplete::expand(input)
    }

    async fn audio_data(&self, audio: &str) -> String {
        let wav = match self.ingest.decode(audio).await {
            Ok(wav) => wav,
            Err(e) => {
                tracing::error!(error = %e, "failed to decode audio payload");
                return NO_SPEECH_DETECTED.to_string();
            }
        };

        // Segment offsets are relative to when the audio is handed over
        let request_time = Utc::now();
        let merged = self
            .transcriber
            .transcribe(&wav)
            .await
            .and_then(|result| self.merger.merge(&result, request_time));
        merged.unwrap_or_else(|e| {
            tracing::error!(error = %e, path = %wav.display(), "transcription failed");
            TRANSCRIPTION_FAILED.to_string()
        })
    }

    async fn event(&self, event_type: &str, event_data: &Value) -> Option<i64> {
        match self.store.append_event(event_type, event_data) {
            Ok(id) => {
                tracing::debug!(event_id = id, event_type, "event recorded");
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, event_type, "failed to save event");
                None
            }
        }
    }

    fn language(&self) -> &str {
        &self.language
    }
}
