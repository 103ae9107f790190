use std::time::Duration;

/// Default Gemini REST base (without the `/models` segment).
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Prodia REST base, used only for key probes.
pub const DEFAULT_PRODIA_BASE: &str = "https://api.prodia.com";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Gemini REST base. Overridable for tests and proxies.
    pub api_base: String,
    /// Prodia REST base for key validation.
    pub prodia_base: String,
    /// Whole-request timeout, including the streamed body.
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            prodia_base: DEFAULT_PRODIA_BASE.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_prodia_base(mut self, prodia_base: impl Into<String>) -> Self {
        self.prodia_base = prodia_base.into().trim_end_matches('/').to_string();
        self
    }
}
