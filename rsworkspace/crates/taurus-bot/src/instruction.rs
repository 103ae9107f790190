//! System instruction sent with every request.

use std::path::Path;

use tracing::warn;

/// Personality lines, one instruction per line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Personality {
    lines: Vec<String>,
}

impl Personality {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Read the personality file. A missing or unreadable file gives an empty personality.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_text(&text),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Personality file unavailable");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Per-device presence of the requester, e.g. `("desktop", "online")`.
pub type DevicePresence = (String, String);

pub fn system_instruction(
    personality: &Personality,
    user_id: u64,
    presence: &[DevicePresence],
) -> String {
    let mut out = personality.lines.join("\n");
    out.push_str(&format!(
        "\n Please greet the user with a greeting and then their name which is: <@{user_id}> and limit your responses to 2000 characters or less."
    ));
    if !presence.is_empty() {
        let devices = presence
            .iter()
            .map(|(platform, status)| format!("{platform}: {status}"))
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&format!(
            " The user's status/presence is currently:\n{devices}"
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personality_skips_blank_lines() {
        let p = Personality::from_text("You are Taurus.\r\n\nBe kind.\n");
        assert_eq!(p.lines, vec!["You are Taurus.", "Be kind."]);
    }

    #[test]
    fn instruction_names_user_and_limit() {
        let p = Personality::from_text("You are Taurus.");
        let s = system_instruction(&p, 42, &[]);
        assert!(s.starts_with("You are Taurus.\n Please greet the user"));
        assert!(s.contains("<@42>"));
        assert!(s.ends_with("2000 characters or less."));
    }

    #[test]
    fn instruction_lists_presence() {
        let s = system_instruction(
            &Personality::default(),
            1,
            &[
                ("desktop".into(), "online".into()),
                ("mobile".into(), "idle".into()),
            ],
        );
        assert!(s.ends_with("The user's status/presence is currently:\ndesktop: online\nmobile: idle"));
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let p = Personality::load("/nonexistent/personality.txt").await;
        assert!(p.is_empty());
    }
}
