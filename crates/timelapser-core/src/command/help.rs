//! Help text generated once from the registered commands.

use std::sync::Arc;

use super::registry::CommandDescriptor;
use crate::chat::{RichText, TextComponent};
use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub name: String,
    pub aliases: Vec<String>,
    pub params: Vec<String>,
    pub description: String,
    /// Text a click on the usage line puts into the chat box.
    pub suggestion: String,
}

impl HelpEntry {
    /// `name(alias1,alias2) <param1> <param2>:`
    pub fn usage(&self) -> String {
        let mut out = self.name.clone();
        if !self.aliases.is_empty() {
            out.push('(');
            out.push_str(&self.aliases.join(","));
            out.push(')');
        }
        for param in &self.params {
            out.push_str(&format!(" <{param}>"));
        }
        out.push(':');
        out
    }

    /// Clickable usage line, gray description line, blank spacer.
    pub fn to_rich_lines(&self) -> Vec<RichText> {
        vec![
            TextComponent::new(self.usage())
                .hover_text(format!("run {}", self.name))
                .suggest_command(self.suggestion.clone())
                .into(),
            TextComponent::new(self.description.clone())
                .italic()
                .color("gray")
                .into(),
            RichText::from(""),
        ]
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Cached help entries, cheap to clone into whoever serves the help command.
#[derive(Debug, Clone, Default)]
pub struct HelpBook {
    entries: Arc<Vec<HelpEntry>>,
}

impl HelpBook {
    pub fn from_commands<Ctx>(commands: &[CommandDescriptor<Ctx>], suggest_prefix: &str) -> Self {
        let entries = commands
            .iter()
            .map(|c| HelpEntry {
                name: c.name.to_string(),
                aliases: c.aliases.iter().map(|a| a.to_string()).collect(),
                params: c.params.iter().map(|p| p.to_string()).collect(),
                description: c.description.to_string(),
                suggestion: format!("{suggest_prefix} {}", c.name),
            })
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn entries(&self) -> &[HelpEntry] {
        &self.entries
    }

    /// All entries, or only the one answering to `name` (canonical name or alias).
    pub fn describe(&self, name: Option<&str>) -> Result<&[HelpEntry], CommandError> {
        let Some(name) = name else {
            return Ok(self.entries());
        };
        self.entries
            .iter()
            .find(|e| e.answers_to(name))
            .map(std::slice::from_ref)
            .ok_or_else(|| CommandError::CommandNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::registry::{CommandCall, HandlerFuture};

    struct Ctx;

    fn noop<'a>(_ctx: &'a mut Ctx, _call: CommandCall) -> HandlerFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn book() -> HelpBook {
        let commands = vec![
            CommandDescriptor::<Ctx> {
                name: "start",
                aliases: &["startRecording"],
                description: "Start recording screenshots",
                params: &[],
                handler: noop,
            },
            CommandDescriptor::<Ctx> {
                name: "setCamera",
                aliases: &["camera", "cam"],
                description: "Set the camera pose",
                params: &["type", "target"],
                handler: noop,
            },
            CommandDescriptor::<Ctx> {
                name: "ping",
                aliases: &[],
                description: "Pong",
                params: &[],
                handler: noop,
            },
        ];
        HelpBook::from_commands(&commands, "!timelapser")
    }

    #[test]
    fn lines_follow_usage_format() {
        let book = book();
        let usages: Vec<String> = book.entries().iter().map(|e| e.usage()).collect();
        assert_eq!(
            usages,
            vec![
                "start(startRecording):",
                "setCamera(camera,cam) <type> <target>:",
                "ping:",
            ]
        );
    }

    #[test]
    fn describe_one_or_all() {
        let book = book();
        assert_eq!(book.describe(None).unwrap().len(), 3);

        let one = book.describe(Some("setCamera")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name, "setCamera");
        assert_eq!(book.describe(Some("cam")).unwrap()[0].name, "setCamera");

        assert_eq!(
            book.describe(Some("fly")).unwrap_err(),
            CommandError::CommandNotFound("fly".to_string())
        );
    }

    #[test]
    fn rich_lines_suggest_the_command() {
        let book = book();
        let lines = book.entries()[0].to_rich_lines();
        assert_eq!(lines.len(), 3);
        let RichText::Component(usage) = &lines[0] else {
            panic!("expected component");
        };
        assert_eq!(
            usage.click_event.as_ref().map(|c| c.value.as_str()),
            Some("!timelapser start")
        );
        assert_eq!(lines[2], RichText::from(""));
    }
}
