//! Application command definitions and the parsing of their options.

#[cfg(test)]
#[path = "commands_tests.rs"]
mod commands_tests;

use llm_gemini::KeyKind;
use serenity::builder::{
    CreateActionRow, CreateButton, CreateCommand, CreateCommandOption, CreateInputText,
    CreateModal,
};
use serenity::model::application::{
    ButtonStyle, Command, CommandOptionType, CommandType, InputTextStyle, ResolvedOption,
    ResolvedValue,
};

use crate::embeds::HelpEntry;
use crate::settings::Settings;

pub const ASK: &str = "ask";
pub const HELP: &str = "help";
pub const MODEL: &str = "model";
pub const APIKEY: &str = "apikey";
pub const ASK_CONTEXT_MENU: &str = "Ask Taurus";

pub const ASK_MODAL_ID: &str = "taurus_ai";
pub const ASK_INPUT_ID: &str = "question_taurusai";
pub const ASK_BUTTON_ID: &str = "taurus_ai_open";

/// Models selectable through `/model`.
pub const MODEL_CHOICES: [(&str, &str); 2] = [
    ("Gemini 1.5 Pro", "gemini-1.5-pro-latest"),
    ("Gemini 1.5 Flash", "gemini-1.5-flash-latest"),
];

/// Every global command the bot registers on startup.
pub fn definitions() -> Vec<CreateCommand> {
    let mut model_name = CreateCommandOption::new(
        CommandOptionType::String,
        "name",
        "The Gemini model used for answers",
    );
    for (label, id) in MODEL_CHOICES {
        model_name = model_name.add_string_choice(label, id);
    }

    vec![
        CreateCommand::new(ASK).description("Ask Taurus a question"),
        CreateCommand::new(HELP).description("Show the available commands"),
        CreateCommand::new(MODEL)
            .description("Change the model settings (Developers only)")
            .add_option(model_name)
            .add_option(CreateCommandOption::new(
                CommandOptionType::Boolean,
                "safety",
                "Block harmful content",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::Boolean,
                "fallback",
                "Switch model once when rate limited",
            )),
        CreateCommand::new(APIKEY)
            .description("Set an API key (Developers only)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "type", "Which key to set")
                    .required(true)
                    .add_string_choice("Gemini", KeyKind::Gemini.as_str())
                    .add_string_choice("Prodia", KeyKind::Prodia.as_str()),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "key", "The API key")
                    .required(true),
            ),
        CreateCommand::new(ASK_CONTEXT_MENU).kind(CommandType::Message),
    ]
}

pub fn ask_modal() -> CreateModal {
    let input = CreateInputText::new(InputTextStyle::Paragraph, "Your question", ASK_INPUT_ID)
        .placeholder("What would you like to ask Taurus?")
        .required(true);
    CreateModal::new(ASK_MODAL_ID, "Ask Taurus")
        .components(vec![CreateActionRow::InputText(input)])
}

pub fn ask_button_row() -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new(ASK_BUTTON_ID)
        .label("Ask Taurus")
        .style(ButtonStyle::Primary)])
}

/// Chat-input commands only, in registration order.
pub fn help_entries(commands: &[Command]) -> Vec<HelpEntry> {
    commands
        .iter()
        .filter(|c| c.kind == CommandType::ChatInput)
        .map(|c| HelpEntry {
            name: c.name.clone(),
            id: c.id.get(),
            description: c.description.clone(),
        })
        .collect()
}

// ── Option parsing ─────────────────────────────────────────────────────────

/// A command option value reduced to what the bot's commands use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionArg {
    Str(String),
    Bool(bool),
}

pub type OptionArgs = Vec<(String, OptionArg)>;

pub fn option_args(options: &[ResolvedOption<'_>]) -> OptionArgs {
    options
        .iter()
        .filter_map(|opt| {
            let value = match &opt.value {
                ResolvedValue::String(s) => OptionArg::Str(s.to_string()),
                ResolvedValue::Boolean(b) => OptionArg::Bool(*b),
                _ => return None,
            };
            Some((opt.name.to_string(), value))
        })
        .collect()
}

fn str_arg<'a>(args: &'a [(String, OptionArg)], name: &str) -> Option<&'a str> {
    args.iter().find_map(|(n, v)| match v {
        OptionArg::Str(s) if n == name => Some(s.as_str()),
        _ => None,
    })
}

fn bool_arg(args: &[(String, OptionArg)], name: &str) -> Option<bool> {
    args.iter().find_map(|(n, v)| match v {
        OptionArg::Bool(b) if n == name => Some(*b),
        _ => None,
    })
}

/// What `/model` asked to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelChange {
    pub model: Option<String>,
    pub safety: Option<bool>,
    pub fallback: Option<bool>,
}

impl ModelChange {
    pub fn from_args(args: &[(String, OptionArg)]) -> Self {
        Self {
            model: str_arg(args, "name").map(String::from),
            safety: bool_arg(args, "safety"),
            fallback: bool_arg(args, "fallback"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.safety.is_none() && self.fallback.is_none()
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.model.model = model.clone();
        }
        if let Some(safety) = self.safety {
            settings.model.safety_system = safety;
        }
        if let Some(fallback) = self.fallback {
            settings.model.fallback_system = fallback;
        }
    }
}

/// Confirmation text for the model settings now in effect.
pub fn describe_model(settings: &Settings) -> String {
    let on_off = |b: bool| if b { "Enabled" } else { "Disabled" };
    format!(
        "> **Model:** `{}`\n> **Safety System:** {}\n> **Fallback System:** {}",
        settings.model.model,
        on_off(settings.model.safety_system),
        on_off(settings.model.fallback_system)
    )
}

/// A validated `/apikey` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyChange {
    pub kind: KeyKind,
    pub key: String,
}

impl ApiKeyChange {
    pub fn from_args(args: &[(String, OptionArg)]) -> Result<Self, String> {
        let kind = str_arg(args, "type")
            .ok_or_else(|| "Missing API type".to_string())?
            .parse::<KeyKind>()?;
        let key = str_arg(args, "key")
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| "Missing API key".to_string())?;
        Ok(Self {
            kind,
            key: key.to_string(),
        })
    }

    pub fn apply(&self, settings: &mut Settings) {
        match self.kind {
            KeyKind::Gemini => settings.api_keys.gemini = self.key.clone(),
            KeyKind::Prodia => settings.api_keys.prodia = self.key.clone(),
        }
    }
}
