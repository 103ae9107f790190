//! Shared Discord types for the Taurus bot
//!
//! A serenity-independent view of the messages the bot reads back from
//! Discord, the footer conventions it uses to mark its own replies, and the
//! Discord JSON error-code taxonomy.

pub mod colors;
pub mod errors;
pub mod footer;
pub mod types;

pub use errors::{DiscordApiFailure, DiscordErrorCode, ErrorCategory};
pub use footer::FooterTag;
pub use types::*;
