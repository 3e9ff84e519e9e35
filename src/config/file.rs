//! TOML configuration file loading
//!
//! Supports `~/.config/gaze-relay/config.toml` (or an explicit path) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::TtsParam;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Transcription service
    #[serde(default)]
    pub transcription: TranscriptionFileConfig,

    /// TTS service and voice parameters
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Language model
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Rolling context window
    #[serde(default)]
    pub context: ContextFileConfig,

    /// Values served to the client UI
    #[serde(default)]
    pub client: ClientFileConfig,

    /// Audio conversion
    #[serde(default)]
    pub audio: AudioFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Base URL under which `/audio` is reachable by clients
    pub public_url: Option<String>,

    /// Directory holding recorded and synthesized audio
    pub audio_dir: Option<String>,

    /// `SQLite` database path
    pub database_path: Option<String>,
}

/// Transcription service configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranscriptionFileConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Language tag reported back to the client
    pub language: Option<String>,
}

/// TTS service configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub url: Option<String>,
    /// Query parameter carrying the text (default "text")
    pub text_param: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Voice parameters, in declaration order
    #[serde(default)]
    pub params: Vec<TtsParam>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible base URL (e.g. "<https://api.openai.com/v1>")
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Model identifier (e.g. "gpt-4o")
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub candidates: Option<usize>,
    pub timeout_secs: Option<u64>,
    /// File holding the persona preamble
    pub system_prompt_path: Option<String>,
}

/// Context window configuration
#[derive(Debug, Default, Deserialize)]
pub struct ContextFileConfig {
    pub window_minutes: Option<i64>,
    pub max_chars: Option<usize>,
}

/// Client UI configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    pub socket_url: Option<String>,
    pub keyboard_layout: Option<String>,
}

/// Audio conversion configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub ffmpeg_path: Option<String>,
    pub transcode_timeout_secs: Option<u64>,
}

/// Load the TOML config file
///
/// Uses `explicit` when given, otherwise the standard path. Returns
/// `RelayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(explicit: Option<&Path>) -> RelayConfigFile {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config_file_path) else {
        return RelayConfigFile::default();
    };

    if !path.exists() {
        if explicit.is_some() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
        return RelayConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RelayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RelayConfigFile::default()
        }
    }
}

/// Return the config file path: `$GAZE_RELAY_CONFIG` or `~/.config/gaze-relay/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GAZE_RELAY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::BaseDirs::new().map(|d| d.config_dir().join("gaze-relay").join("config.toml"))
}
