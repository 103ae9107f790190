use serde::{Deserialize, Serialize};

/// Default cap on generated tokens per answer.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 750;

// ── Conversation ──────────────────────────────────────────────────────────────

/// Who produced a turn. Gemini only knows `"user"` and `"model"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One role-tagged utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Chronological (oldest first) sequence of turns for one request.
///
/// Reply chains are walked newest to oldest, so turns are usually added with
/// [`ConversationThread::prepend`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationThread {
    turns: Vec<Turn>,
}

impl ConversationThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a turn before every turn already in the thread.
    pub fn prepend(&mut self, turn: Turn) {
        self.turns.insert(0, turn);
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

impl From<Vec<Turn>> for ConversationThread {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

// ── Safety ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockMediumAndAbove,
    BlockNone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// The four category/threshold pairs sent with every request.
///
/// With the safety system off every threshold is `BLOCK_NONE`.
pub fn safety_settings(safety_enabled: bool) -> Vec<SafetySetting> {
    let threshold = if safety_enabled {
        HarmBlockThreshold::BlockMediumAndAbove
    } else {
        HarmBlockThreshold::BlockNone
    };
    [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold,
    })
    .collect()
}

// ── Request ───────────────────────────────────────────────────────────────────

/// Everything a provider needs to answer one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    pub safety_settings: Vec<SafetySetting>,
    pub max_output_tokens: u32,
    /// Full history, ending with the prompt being answered.
    pub turns: Vec<Turn>,
}

impl PromptRequest {
    /// Build a request from prior history plus the new user prompt.
    pub fn new(history: ConversationThread, prompt: impl Into<String>) -> Self {
        let mut turns = history.into_turns();
        turns.push(Turn::user(prompt));
        Self {
            system_instruction: None,
            safety_settings: safety_settings(true),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            turns,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_safety(mut self, safety_enabled: bool) -> Self {
        self.safety_settings = safety_settings(safety_enabled);
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_keeps_oldest_first() {
        let mut thread = ConversationThread::new();
        thread.prepend(Turn::model("third"));
        thread.prepend(Turn::user("second"));
        thread.prepend(Turn::model("first"));
        let texts: Vec<&str> = thread.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }

    #[test]
    fn safety_enabled_blocks_medium() {
        let settings = safety_settings(true);
        assert_eq!(settings.len(), 4);
        assert!(settings
            .iter()
            .all(|s| s.threshold == HarmBlockThreshold::BlockMediumAndAbove));
    }

    #[test]
    fn safety_disabled_blocks_none() {
        let settings = safety_settings(false);
        assert_eq!(settings.len(), 4);
        assert!(settings
            .iter()
            .all(|s| s.threshold == HarmBlockThreshold::BlockNone));
    }

    #[test]
    fn safety_setting_wire_names() {
        let json = serde_json::to_value(safety_settings(true)[1]).unwrap();
        assert_eq!(json["category"], "HARM_CATEGORY_HATE_SPEECH");
        assert_eq!(json["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
    }

    #[test]
    fn prompt_request_appends_prompt_last() {
        let history = ConversationThread::from(vec![Turn::user("hi"), Turn::model("hello")]);
        let req = PromptRequest::new(history, "how are you?").with_safety(false);
        assert_eq!(req.turns.len(), 3);
        assert_eq!(req.turns[2], Turn::user("how are you?"));
        assert_eq!(req.max_output_tokens, 750);
        assert_eq!(req.safety_settings[0].threshold, HarmBlockThreshold::BlockNone);
    }
}
