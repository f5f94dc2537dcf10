//! Rich-text chat messages sent through the server's `/tellraw` command.

use serde::Serialize;

pub const BOT_PREFIX: &str = "[Timelapser] ";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RichText {
    Plain(String),
    Component(TextComponent),
    List(Vec<RichText>),
}

impl From<&str> for RichText {
    fn from(text: &str) -> Self {
        RichText::Plain(text.to_string())
    }
}

impl From<String> for RichText {
    fn from(text: String) -> Self {
        RichText::Plain(text)
    }
}

impl From<TextComponent> for RichText {
    fn from(component: TextComponent) -> Self {
        RichText::Component(component)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextComponent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_event: Option<ClickEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_event: Option<HoverEvent>,
}

impl TextComponent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn suggest_command(mut self, command: impl Into<String>) -> Self {
        self.click_event = Some(ClickEvent {
            action: ClickAction::SuggestCommand,
            value: command.into(),
        });
        self
    }

    pub fn hover_text(mut self, text: impl Into<String>) -> Self {
        self.hover_event = Some(HoverEvent {
            action: HoverAction::ShowText,
            value: text.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClickEvent {
    pub action: ClickAction,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClickAction {
    SuggestCommand,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HoverEvent {
    pub action: HoverAction,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HoverAction {
    ShowText,
}

pub fn with_bot_prefix(message: impl Into<RichText>) -> RichText {
    RichText::List(vec![RichText::from(BOT_PREFIX), message.into()])
}

/// Renders the chat line that shows `message` to `target` (a username or selector).
pub fn tellraw(target: &str, message: &RichText) -> String {
    let json = serde_json::to_string(message).unwrap_or_else(|_| "\"\"".to_string());
    format!("/tellraw {target} {json}")
}

/// Number as shown in feedback: at most six characters of its decimal form.
pub fn short_number(value: f64) -> String {
    value.to_string().chars().take(6).collect()
}

pub fn short_position(values: [f64; 3]) -> String {
    values
        .iter()
        .map(|v| short_number(*v))
        .collect::<Vec<_>>()
        .join(", ")
}
