//! Google Gemini client used by the Taurus bot.
//!
//! Answers are requested from `streamGenerateContent` over SSE and
//! accumulated into a single string; callers only ever see the finished text
//! or a [`GeminiError`].

pub mod client;
pub mod config;
pub mod error;
pub mod probe;

pub use client::GeminiClient;
pub use config::GeminiConfig;
pub use error::{GeminiError, EMPTY_RESPONSE, SAFETY_BLOCKED};
pub use probe::KeyKind;
