//! API key validity probes.
//!
//! A key is considered valid when a cheap authenticated GET returns HTTP 200.
//! Transport failures count as invalid.

use std::str::FromStr;

use crate::client::{GeminiClient, API_KEY_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Gemini,
    Prodia,
}

impl KeyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::Gemini => "gemini",
            KeyKind::Prodia => "prodia",
        }
    }
}

impl FromStr for KeyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(KeyKind::Gemini),
            "prodia" => Ok(KeyKind::Prodia),
            other => Err(format!("Invalid API type: {other}")),
        }
    }
}

impl GeminiClient {
    /// Check whether `key` is accepted by the vendor behind `kind`.
    pub async fn check_api_key(&self, kind: KeyKind, key: &str) -> bool {
        let request = match kind {
            KeyKind::Gemini => self
                .http
                .get(format!("{}/models", self.config.api_base))
                .header(API_KEY_HEADER, key),
            KeyKind::Prodia => self
                .http
                .get(format!("{}/v1/sd/loras", self.config.prodia_base))
                .header("X-Prodia-Key", key)
                .header("accept", "application/json"),
        };

        match request.send().await {
            Ok(resp) => {
                let ok = resp.status() == reqwest::StatusCode::OK;
                tracing::debug!(kind = kind.as_str(), status = %resp.status(), "API key probe");
                ok
            }
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e.without_url(), "API key probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Gemini".parse::<KeyKind>(), Ok(KeyKind::Gemini));
        assert_eq!("PRODIA".parse::<KeyKind>(), Ok(KeyKind::Prodia));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(
            "openai".parse::<KeyKind>(),
            Err("Invalid API type: openai".to_string())
        );
    }
}
