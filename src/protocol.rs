//! WebSocket message protocol
//!
//! Every inbound text frame is `{"request_type": ..., "data": {...}}` and gets
//! exactly one [`Response`]. Classification happens in two steps: the frame is
//! read as a [`RawRequest`], the tag is matched against [`RequestType`], and
//! only then is `data` decoded into the typed payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// Closed set of request tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Predict,
    Synthesise,
    Autocomplete,
    AudioData,
    Event,
}

impl RequestType {
    /// Wire name of this tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Predict => "PREDICT",
            Self::Synthesise => "SYNTHESISE",
            Self::Autocomplete => "AUTOCOMPLETE",
            Self::AudioData => "AUDIO_DATA",
            Self::Event => "EVENT",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PREDICT" => Ok(Self::Predict),
            "SYNTHESISE" => Ok(Self::Synthesise),
            "AUTOCOMPLETE" => Ok(Self::Autocomplete),
            "AUDIO_DATA" => Ok(Self::AudioData),
            "EVENT" => Ok(Self::Event),
            other => Err(Error::UnknownRequestType(other.to_string())),
        }
    }
}

/// Envelope before the tag is classified
#[derive(Debug, Deserialize)]
pub struct RawRequest {
    pub request_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SynthesiseRequest {
    pub text: String,
    /// Voice-control values keyed by configured parameter name
    #[serde(rename = "ttsData", default)]
    pub tts_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutocompleteRequest {
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AudioDataRequest {
    /// Base64 data URL of compressed audio
    pub audio: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventRequest {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

/// A classified, typed inbound request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Predict(PredictRequest),
    Synthesise(SynthesiseRequest),
    Autocomplete(AutocompleteRequest),
    AudioData(AudioDataRequest),
    Event(EventRequest),
}

impl Request {
    /// Tag of this request
    #[must_use]
    pub const fn request_type(&self) -> RequestType {
        match self {
            Self::Predict(_) => RequestType::Predict,
            Self::Synthesise(_) => RequestType::Synthesise,
            Self::Autocomplete(_) => RequestType::Autocomplete,
            Self::AudioData(_) => RequestType::AudioData,
            Self::Event(_) => RequestType::Event,
        }
    }

    /// Classify and decode one text frame
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] carrying the error response for the frame
    pub fn parse(frame: &str) -> Result<Self, Rejection> {
        let raw: RawRequest = serde_json::from_str(frame).map_err(|e| Rejection {
            request_type: ERROR_REQUEST_TYPE.to_string(),
            code: ErrorCode::InvalidJson,
            message: e.to_string(),
        })?;

        let request_type: RequestType = raw.request_type.parse().map_err(|e: Error| Rejection {
            request_type: raw.request_type.clone(),
            code: ErrorCode::UnknownRequestType,
            message: e.to_string(),
        })?;

        let invalid = |e: serde_json::Error| Rejection {
            request_type: request_type.as_str().to_string(),
            code: ErrorCode::InvalidRequest,
            message: Error::InvalidRequest(e.to_string()).to_string(),
        };

        let request = match request_type {
            RequestType::Predict => {
                Self::Predict(serde_json::from_value(raw.data).map_err(invalid)?)
            }
            RequestType::Synthesise => {
                Self::Synthesise(serde_json::from_value(raw.data).map_err(invalid)?)
            }
            RequestType::Autocomplete => {
                Self::Autocomplete(serde_json::from_value(raw.data).map_err(invalid)?)
            }
            RequestType::AudioData => {
                Self::AudioData(serde_json::from_value(raw.data).map_err(invalid)?)
            }
            RequestType::Event => Self::Event(serde_json::from_value(raw.data).map_err(invalid)?),
        };
        Ok(request)
    }
}

/// `request_type` used when a frame cannot be read at all
pub const ERROR_REQUEST_TYPE: &str = "ERROR";

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    UnknownRequestType,
    InvalidRequest,
    CompletionFailed,
    SynthesisFailed,
    InternalError,
}

/// A frame that could not be turned into a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub request_type: String,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_type: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Successful response carrying `data`
    #[must_use]
    pub fn ok(request_type: RequestType, data: Value) -> Self {
        Self {
            request_type: request_type.as_str().to_string(),
            data,
            language: None,
            error: None,
        }
    }

    /// `{"options": [...]}` response
    #[must_use]
    pub fn options(request_type: RequestType, options: Vec<String>) -> Self {
        Self::ok(request_type, serde_json::json!({ "options": options }))
    }

    /// `AUDIO_DATA` response: the transcript as a bare string plus its language
    #[must_use]
    pub fn transcript(text: String, language: &str) -> Self {
        Self {
            language: Some(language.to_string()),
            ..Self::ok(RequestType::AudioData, Value::String(text))
        }
    }

    /// Error response with `data: null`
    #[must_use]
    pub fn error(
        request_type: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_type: request_type.into(),
            data: Value::Null,
            language: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// Whether this is an error response
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<Rejection> for Response {
    fn from(rejection: Rejection) -> Self {
        Self::error(rejection.request_type, rejection.code, rejection.message)
    }
}
