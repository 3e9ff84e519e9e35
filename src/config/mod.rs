//! Configuration management for the gaze relay
//!
//! Values resolve with priority env > TOML file > default. The resolved
//! [`Config`] is immutable and handed to each component at construction time.

pub mod file;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::completion::DEFAULT_PERSONA_PROMPT;
use crate::context::ContextConfig;
use crate::{Error, Result};

use file::RelayConfigFile;

/// Gaze relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket server configuration
    pub server: ServerConfig,

    /// Transcription service configuration
    pub transcription: TranscriptionConfig,

    /// TTS service configuration
    pub tts: TtsConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Rolling context window limits
    pub context: ContextConfig,

    /// Values served to the client UI
    pub client: ClientConfig,

    /// Audio conversion
    pub audio: AudioConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Base URL under which `/audio` is reachable by clients
    pub public_url: String,

    /// Directory holding recorded and synthesized audio
    pub audio_dir: PathBuf,

    /// `SQLite` database path
    pub database_path: PathBuf,
}

/// Transcription service configuration
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Multipart upload endpoint
    pub url: String,

    /// Request deadline
    pub timeout: Duration,

    /// Language tag reported with every `AUDIO_DATA` response
    pub language: String,
}

/// TTS service configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Synthesis endpoint (GET)
    pub url: String,

    /// Query parameter carrying the text
    pub text_param: String,

    /// Request deadline
    pub timeout: Duration,

    /// Voice parameters in declaration order
    pub params: Vec<TtsParam>,
}

/// A voice-control parameter and its mapping onto the TTS query grammar
///
/// `group`, `min`, `max` and `default` are UI metadata for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsParam {
    /// Name used by the client in `ttsData`
    pub name: String,

    /// TTS query parameter this value lands in
    pub url_param: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

impl TtsParam {
    /// Convenience constructor without UI metadata
    #[must_use]
    pub fn new(name: impl Into<String>, url_param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_param: url_param.into(),
            group: None,
            min: None,
            max: None,
            default: None,
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Bearer key (from `OPENAI_API_KEY` env)
    pub api_key: Option<String>,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Number of candidates requested per prediction
    pub candidates: usize,

    /// Request deadline
    pub timeout: Duration,

    /// Persona preamble prepended to the context window
    pub persona_prompt: String,
}

/// Values served to the client UI via `/config`
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL the client should connect to
    pub socket_url: String,

    /// On-screen keyboard layout name
    pub keyboard_layout: String,
}

/// Audio conversion configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// `ffmpeg` binary
    pub ffmpeg_path: PathBuf,

    /// Deadline for a single conversion
    pub transcode_timeout: Duration,
}

/// Default port (matches the socket URL AAC clients ship with)
pub const DEFAULT_PORT: u16 = 8765;

/// Longest accepted context window
pub const MAX_WINDOW_DAYS: i64 = 7;

impl Default for Config {
    fn default() -> Self {
        // Defaults never read a persona file, so resolution cannot fail
        Self::resolve(RelayConfigFile::default(), |_| None).unwrap_or_else(|_| unreachable!())
    }
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the persona prompt file cannot be read or validation fails
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path);
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Resolve a parsed config file against an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the persona prompt file cannot be read or validation fails
    pub fn resolve(fc: RelayConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".gaze-relay"),
            |d| d.data_dir().join("gaze-relay"),
        );

        // Server config (env > toml > default)
        let port = env("GAZE_RELAY_PORT")
            .or_else(|| env("PORT"))
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);

        let public_url = env("GAZE_RELAY_PUBLIC_URL")
            .or(fc.server.public_url)
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let server = ServerConfig {
            port,
            public_url,
            audio_dir: env("GAZE_RELAY_AUDIO_DIR")
                .or(fc.server.audio_dir)
                .map_or_else(|| data_dir.join("audio"), PathBuf::from),
            database_path: env("GAZE_RELAY_DATABASE")
                .or(fc.server.database_path)
                .map_or_else(|| data_dir.join("transcriptions.db"), PathBuf::from),
        };

        let transcription = TranscriptionConfig {
            url: env("GAZE_RELAY_TRANSCRIPTION_URL")
                .or(fc.transcription.url)
                .unwrap_or_else(|| "http://localhost:9000/transcribe".to_string()),
            timeout: Duration::from_secs(fc.transcription.timeout_secs.unwrap_or(60)),
            language: fc.transcription.language.unwrap_or_else(|| "en".to_string()),
        };

        let tts = TtsConfig {
            url: env("GAZE_RELAY_TTS_URL")
                .or(fc.tts.url)
                .unwrap_or_else(|| "http://localhost:59125/api/tts".to_string()),
            text_param: fc.tts.text_param.unwrap_or_else(|| "text".to_string()),
            timeout: Duration::from_secs(fc.tts.timeout_secs.unwrap_or(30)),
            params: fc.tts.params,
        };

        let persona_prompt = match env("GAZE_RELAY_SYSTEM_PROMPT").or(fc.llm.system_prompt_path) {
            Some(path) => std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("failed to read system prompt {path}: {e}"))
            })?,
            None => DEFAULT_PERSONA_PROMPT.to_string(),
        };

        let llm = LlmConfig {
            base_url: env("GAZE_RELAY_LLM_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: env("OPENAI_API_KEY").or(fc.llm.api_key),
            model: env("GAZE_RELAY_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-4o".to_string()),
            temperature: fc.llm.temperature.unwrap_or(1.0),
            candidates: fc.llm.candidates.unwrap_or(3),
            timeout: Duration::from_secs(fc.llm.timeout_secs.unwrap_or(30)),
            persona_prompt,
        };

        let defaults = ContextConfig::default();
        let window = match fc.context.window_minutes {
            Some(minutes) => chrono::TimeDelta::try_minutes(minutes).ok_or_else(|| {
                Error::Config(format!("context.window_minutes out of range: {minutes}"))
            })?,
            None => defaults.window,
        };
        let context = ContextConfig {
            window,
            max_chars: fc.context.max_chars.unwrap_or(defaults.max_chars),
        };

        let client = ClientConfig {
            socket_url: fc
                .client
                .socket_url
                .unwrap_or_else(|| format!("ws://localhost:{port}/ws")),
            keyboard_layout: fc
                .client
                .keyboard_layout
                .unwrap_or_else(|| "english".to_string()),
        };

        let audio = AudioConfig {
            ffmpeg_path: env("GAZE_RELAY_FFMPEG")
                .or(fc.audio.ffmpeg_path)
                .map_or_else(|| PathBuf::from("ffmpeg"), PathBuf::from),
            transcode_timeout: Duration::from_secs(fc.audio.transcode_timeout_secs.unwrap_or(30)),
        };

        let config = Self {
            server,
            transcription,
            tts,
            llm,
            context,
            client,
            audio,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns error describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if self.llm.candidates == 0 {
            return Err(Error::Config("llm.candidates must be at least 1".to_string()));
        }
        if self.context.window <= chrono::TimeDelta::zero() {
            return Err(Error::Config("context.window_minutes must be positive".to_string()));
        }
        if self.context.window > chrono::TimeDelta::days(MAX_WINDOW_DAYS) {
            return Err(Error::Config(format!(
                "context.window_minutes must be at most {MAX_WINDOW_DAYS} days"
            )));
        }
        if self.context.max_chars == 0 {
            return Err(Error::Config("context.max_chars must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for param in &self.tts.params {
            if !seen.insert(param.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate tts parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.public_url, "http://localhost:8765");
        assert_eq!(config.llm.candidates, 3);
        assert_eq!(config.transcription.language, "en");
        assert_eq!(config.context.max_chars, 4000);
        assert_eq!(config.context.window, chrono::TimeDelta::minutes(10));
        assert!(config.tts.params.is_empty());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: RelayConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000
            public_url = "http://files.local/"

            [llm]
            model = "file-model"
            "#,
        )
        .unwrap();

        let config = Config::resolve(fc, |key| match key {
            "GAZE_RELAY_PORT" => Some("9100".to_string()),
            "GAZE_RELAY_LLM_MODEL" => Some("env-model".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.public_url, "http://files.local");
        assert_eq!(config.llm.model, "env-model");
    }

    #[test]
    fn test_duplicate_tts_param_rejected() {
        let fc: RelayConfigFile = toml::from_str(
            r#"
            [[tts.params]]
            name = "speed"
            url_param = "rate"

            [[tts.params]]
            name = "speed"
            url_param = "tempo"
            "#,
        )
        .unwrap();

        let result = Config::resolve(fc, |_| None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_candidates_rejected() {
        let fc: RelayConfigFile = toml::from_str("[llm]\ncandidates = 0\n").unwrap();
        assert!(Config::resolve(fc, |_| None).is_err());
    }

    #[test]
    fn test_missing_prompt_file_is_error() {
        let fc = RelayConfigFile::default();
        let result = Config::resolve(fc, |key| {
            (key == "GAZE_RELAY_SYSTEM_PROMPT").then(|| "/nonexistent/prompt.txt".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_context_window_bounds() {
        let week = toml::from_str("[context]\nwindow_minutes = 10080\n").unwrap();
        let config = tokio_test::assert_ok!(Config::resolve(week, |_| None));
        assert_eq!(config.context.window, chrono::TimeDelta::days(MAX_WINDOW_DAYS));

        let too_long = toml::from_str("[context]\nwindow_minutes = 10081\n").unwrap();
        tokio_test::assert_err!(Config::resolve(too_long, |_| None));

        let overflowing =
            toml::from_str("[context]\nwindow_minutes = 9223372036854775807\n").unwrap();
        let err = tokio_test::assert_err!(Config::resolve(overflowing, |_| None));
        assert!(matches!(err, Error::Config(_)));
    }
}
