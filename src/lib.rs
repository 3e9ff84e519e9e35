//! Gaze Relay - conversation relay for eye-gaze AAC clients
//!
//! This library provides the server side of an augmentative and alternative
//! communication (AAC) front end:
//! - Speech capture: inbound audio is transcoded, transcribed and recorded
//! - Reply prediction from the recent conversation
//! - Speech synthesis with per-request voice controls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              AAC client (WebSocket)                  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   EventRouter  →  Pipeline                           │
//! │   AudioIngest │ SegmentMerger │ Completion │ TTS     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   TranscriptStore (SQLite)  │  ContextWindow         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod autocomplete;
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod router;
pub mod voice;

pub use config::Config;
pub use context::{ContextConfig, ContextWindow};
pub use db::{DbConn, DbPool, TranscriptStore};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use protocol::{Request, RequestType, Response};
pub use router::{EventRouter, Handlers};
