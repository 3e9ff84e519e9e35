//! Shared test utilities
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use gaze_relay::completion::{CompletionEngine, CompletionModel, CompletionRequest};
use gaze_relay::config::TtsParam;
use gaze_relay::voice::{
    AudioIngest, SpeechSynthesizer, SynthesisTemplater, Transcoder, TranscriptionResult,
    TranscriptionSegment, Transcriber,
};
use gaze_relay::{
    ContextConfig, ContextWindow, DbPool, Error, Pipeline, Result, TranscriptStore, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// A data-URL payload wrapping arbitrary bytes
#[must_use]
pub fn audio_payload(bytes: &[u8]) -> String {
    format!("data:audio/webm;codecs=opus;base64,{}", STANDARD.encode(bytes))
}

/// Writes a tenth of a second of silence regardless of input
pub struct SilentTranscoder;

#[async_trait]
impl Transcoder for SilentTranscoder {
    async fn to_wav(&self, _input: &Path, output: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer =
            hound::WavWriter::create(output, spec).map_err(|e| Error::Transcode(e.to_string()))?;
        for _ in 0..1600 {
            writer
                .write_sample(0i16)
                .map_err(|e| Error::Transcode(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Transcode(e.to_string()))
    }
}

/// Returns fixed segments, or fails when `segments` is `None`
pub struct ScriptedTranscriber {
    pub segments: Option<Vec<TranscriptionSegment>>,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _wav: &Path) -> Result<TranscriptionResult> {
        self.segments
            .clone()
            .map(|segments| TranscriptionResult { segments })
            .ok_or_else(|| Error::Stt("service unavailable".to_string()))
    }
}

/// Returns `count` numbered replies
pub struct CountingModel {
    pub count: usize,
}

#[async_trait]
impl CompletionModel for CountingModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        Ok((1..=self.count)
            .map(|i| format!("{} {i}", request.user))
            .collect())
    }
}

/// Returns fixed audio, or fails when `audio` is empty
pub struct StaticSynthesizer {
    pub audio: Vec<u8>,
}

#[async_trait]
impl SpeechSynthesizer for StaticSynthesizer {
    async fn synthesize(&self, _text: &str, _query: &str) -> Result<Vec<u8>> {
        if self.audio.is_empty() {
            return Err(Error::Tts("connection refused".to_string()));
        }
        Ok(self.audio.clone())
    }
}

/// Knobs for [`build_pipeline`]
pub struct Fakes {
    pub segments: Option<Vec<TranscriptionSegment>>,
    pub candidates: usize,
    pub tts_audio: Vec<u8>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            segments: Some(vec![TranscriptionSegment::new(" hello world", 0.0, 1.2)]),
            candidates: 3,
            tts_audio: b"RIFF....WAVE".to_vec(),
        }
    }
}

/// A pipeline wired to in-process fakes
#[must_use]
pub fn build_pipeline(store: &TranscriptStore, audio_dir: &Path, fakes: Fakes) -> Pipeline {
    let ingest = AudioIngest::new(audio_dir.to_path_buf(), Arc::new(SilentTranscoder));
    let completion = CompletionEngine::new(
        Arc::new(CountingModel {
            count: fakes.candidates,
        }),
        ContextWindow::new(store.clone(), ContextConfig::default()),
        "persona\n".to_string(),
        3,
        1.0,
    );
    let templater = SynthesisTemplater::new(
        vec![TtsParam::new("speed", "rate"), TtsParam::new("voice", "voice")],
        Arc::new(StaticSynthesizer {
            audio: fakes.tts_audio,
        }),
        store.clone(),
        audio_dir.to_path_buf(),
        "http://relay.test".to_string(),
    );

    Pipeline::new(
        store.clone(),
        ingest,
        Arc::new(ScriptedTranscriber {
            segments: fakes.segments,
        }),
        completion,
        templater,
        "en".to_string(),
    )
}
