//! Rolling conversational context for the language model
//!
//! Derived per request from the transcript store; nothing here is persisted.

mod window;

pub use window::{ContextConfig, ContextWindow, format_lines, truncate_oldest};
