//! Discord API error taxonomy.
//!
//! Maps the Discord JSON error codes the bot actually runs into
//! (<https://discord.com/developers/docs/topics/opcodes-and-status-codes#json>)
//! onto named variants; everything else falls through to
//! [`DiscordErrorCode::Unknown`].

use serde::{Deserialize, Serialize};

/// High-level category of a Discord API error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate limit hit - wait before retrying.
    RateLimit,
    /// Target resource (channel, message, interaction …) not found.
    NotFound,
    /// Insufficient bot permissions for the requested action.
    PermissionDenied,
    /// Malformed or semantically invalid input.
    InvalidInput,
    /// Network or I/O error (transient).
    Network,
    /// Unknown or uncategorised error.
    Unknown,
}

/// Discord-specific error code (subset relevant to the bot).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscordErrorCode {
    /// 10003: Unknown channel.
    UnknownChannel,
    /// 10008: Unknown message (likely deleted).
    UnknownMessage,
    /// 10062: Unknown interaction (token expired or already acknowledged).
    UnknownInteraction,
    /// 50001: Missing access.
    MissingAccess,
    /// 50013: Missing permissions.
    MissingPermissions,
    /// HTTP 429: Global or per-route rate limit.
    RateLimited,
    /// 50006: Cannot send an empty message.
    CannotSendEmptyMessage,
    /// 50035: Invalid form body (validation failed).
    InvalidFormBody,
    /// 160002: Cannot reply without permission to read message history.
    CannotReplyWithoutHistory,
    /// Network or I/O error on the client side.
    NetworkError,
    /// Any Discord JSON error code not listed above.
    Unknown,
}

impl DiscordErrorCode {
    /// Derive the code from a raw Discord JSON error code integer.
    pub fn from_raw(code: u32) -> Self {
        match code {
            10003 => Self::UnknownChannel,
            10008 => Self::UnknownMessage,
            10062 => Self::UnknownInteraction,
            50001 => Self::MissingAccess,
            50006 => Self::CannotSendEmptyMessage,
            50013 => Self::MissingPermissions,
            50035 => Self::InvalidFormBody,
            160002 => Self::CannotReplyWithoutHistory,
            _ => Self::Unknown,
        }
    }

    /// The high-level category for this code.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownChannel | Self::UnknownMessage | Self::UnknownInteraction => {
                ErrorCategory::NotFound
            }
            Self::MissingAccess | Self::MissingPermissions => ErrorCategory::PermissionDenied,
            Self::RateLimited => ErrorCategory::RateLimit,
            Self::CannotSendEmptyMessage
            | Self::InvalidFormBody
            | Self::CannotReplyWithoutHistory => ErrorCategory::InvalidInput,
            Self::NetworkError => ErrorCategory::Network,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }

    /// True when a referenced message is gone or cannot be read by the bot.
    pub fn is_inaccessible(&self) -> bool {
        matches!(
            self,
            Self::UnknownMessage | Self::UnknownChannel | Self::MissingAccess
        )
    }
}

/// A failed Discord API call, reduced to what callers branch on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordApiFailure {
    pub code: DiscordErrorCode,
    /// Raw Discord JSON error code (0 if not an API error).
    pub raw_code: u32,
    /// HTTP status code (0 if not an HTTP error).
    pub http_status: u16,
    pub message: String,
}

impl DiscordApiFailure {
    pub fn from_response(raw_code: u32, http_status: u16, message: impl Into<String>) -> Self {
        let code = if http_status == 429 {
            DiscordErrorCode::RateLimited
        } else {
            DiscordErrorCode::from_raw(raw_code)
        };
        Self {
            code,
            raw_code,
            http_status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            code: DiscordErrorCode::NetworkError,
            raw_code: 0,
            http_status: 0,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DiscordApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.http_status == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(
                f,
                "{} (HTTP {} / code {})",
                self.message, self.http_status, self.raw_code
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_serde() {
        for (variant, expected) in [
            (ErrorCategory::RateLimit, "\"rate_limit\""),
            (ErrorCategory::NotFound, "\"not_found\""),
            (ErrorCategory::PermissionDenied, "\"permission_denied\""),
            (ErrorCategory::InvalidInput, "\"invalid_input\""),
            (ErrorCategory::Network, "\"network\""),
            (ErrorCategory::Unknown, "\"unknown\""),
        ] {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, expected, "unexpected JSON for {:?}", variant);
        }
    }

    #[test]
    fn test_from_raw_known_codes() {
        assert_eq!(
            DiscordErrorCode::from_raw(10008),
            DiscordErrorCode::UnknownMessage
        );
        assert_eq!(
            DiscordErrorCode::from_raw(50006),
            DiscordErrorCode::CannotSendEmptyMessage
        );
        assert_eq!(
            DiscordErrorCode::from_raw(50001),
            DiscordErrorCode::MissingAccess
        );
    }

    #[test]
    fn test_from_raw_unknown_falls_through() {
        assert_eq!(DiscordErrorCode::from_raw(99999), DiscordErrorCode::Unknown);
        assert_eq!(DiscordErrorCode::from_raw(0), DiscordErrorCode::Unknown);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            DiscordErrorCode::UnknownMessage.category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            DiscordErrorCode::MissingAccess.category(),
            ErrorCategory::PermissionDenied
        );
        assert_eq!(
            DiscordErrorCode::CannotSendEmptyMessage.category(),
            ErrorCategory::InvalidInput
        );
        assert_eq!(
            DiscordErrorCode::RateLimited.category(),
            ErrorCategory::RateLimit
        );
    }

    #[test]
    fn test_inaccessible() {
        assert!(DiscordErrorCode::UnknownMessage.is_inaccessible());
        assert!(DiscordErrorCode::MissingAccess.is_inaccessible());
        assert!(!DiscordErrorCode::MissingPermissions.is_inaccessible());
        assert!(!DiscordErrorCode::NetworkError.is_inaccessible());
    }

    #[test]
    fn test_failure_429_is_rate_limited_regardless_of_code() {
        let f = DiscordApiFailure::from_response(0, 429, "You are being rate limited.");
        assert_eq!(f.code, DiscordErrorCode::RateLimited);
    }

    #[test]
    fn test_failure_display() {
        let f = DiscordApiFailure::from_response(10008, 404, "Unknown Message");
        assert_eq!(f.to_string(), "Unknown Message (HTTP 404 / code 10008)");
        let n = DiscordApiFailure::network("connection reset");
        assert_eq!(n.to_string(), "connection reset");
    }
}
