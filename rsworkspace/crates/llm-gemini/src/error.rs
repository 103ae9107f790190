use thiserror::Error;

/// Message carried by a safety-blocked answer.
pub const SAFETY_BLOCKED: &str = "safety-blocked";

/// Message carried by an answer with no text.
pub const EMPTY_RESPONSE: &str = "empty-response";

#[derive(Debug, Error)]
pub enum GeminiError {
    /// The prompt or the candidate was blocked by the safety filters.
    #[error("safety-blocked")]
    SafetyBlocked,

    /// The stream finished without any text.
    #[error("empty-response")]
    EmptyResponse,

    /// Gemini answered with an error status, either up front or mid-stream.
    #[error("Gemini API {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport failure. The request URL is stripped before it is stored.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("stream read error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        GeminiError::Http(err.without_url())
    }
}

impl GeminiError {
    /// HTTP status behind the failure, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GeminiError::Api { status, .. } => Some(*status),
            GeminiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_messages() {
        assert_eq!(GeminiError::SafetyBlocked.to_string(), SAFETY_BLOCKED);
        assert_eq!(GeminiError::EmptyResponse.to_string(), EMPTY_RESPONSE);
    }

    #[test]
    fn test_api_status() {
        let err = GeminiError::Api {
            status: 429,
            message: "Resource has been exhausted".to_string(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "Gemini API 429: Resource has been exhausted");
    }

    #[test]
    fn test_no_status_for_sentinels() {
        assert_eq!(GeminiError::SafetyBlocked.status(), None);
        assert_eq!(GeminiError::Stream("eof".into()).status(), None);
    }
}
