//! Client-facing configuration endpoint
//!
//! The front end reads this once at startup to find the socket and to build
//! its voice-control sliders.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::{Serialize, Serializer};

use super::ApiState;
use crate::config::{Config, TtsParam};

/// `GET /config` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigResponse {
    pub socket_url: String,
    pub keyboard_layout: String,
    /// Keyed by parameter name, in declaration order
    #[serde(rename = "tts_params", serialize_with = "params_by_name")]
    pub tts_params: Vec<TtsParam>,
}

impl ClientConfigResponse {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            socket_url: config.client.socket_url.clone(),
            keyboard_layout: config.client.keyboard_layout.clone(),
            tts_params: config.tts.params.clone(),
        }
    }
}

/// A parameter's UI metadata without its name
#[derive(Serialize)]
struct ParamView<'a> {
    url_param: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<f64>,
}

fn params_by_name<S: Serializer>(params: &[TtsParam], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(params.iter().map(|p| {
        (
            p.name.as_str(),
            ParamView {
                url_param: &p.url_param,
                group: p.group.as_deref(),
                min: p.min,
                max: p.max,
                default: p.default,
            },
        )
    }))
}

async fn client_config(State(state): State<Arc<ApiState>>) -> Json<ClientConfigResponse> {
    Json(state.client_config.clone())
}

/// Build client config router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/config", get(client_config))
        .with_state(state)
}
