use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use super::help::{HelpBook, HelpEntry};
use crate::error::CommandError;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Command body. Runs to completion before the next chat message is parsed.
pub type Handler<Ctx> = for<'a> fn(&'a mut Ctx, CommandCall) -> HandlerFuture<'a>;

/// Positional tokens bound to a command's declared parameter names.
///
/// The Nth token fills the Nth parameter. Extra tokens are dropped and missing
/// trailing parameters stay unset, which handlers read as "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs {
    slots: Vec<(&'static str, Option<String>)>,
}

impl BoundArgs {
    pub fn bind(params: &[&'static str], tokens: &[String]) -> Self {
        let slots = params
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, tokens.get(i).cloned()))
            .collect();
        Self { slots }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(param, _)| *param == name)
            .and_then(|(_, value)| value.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    /// Username of whoever typed the command.
    pub invoker: String,
    /// Canonical command name, whichever alias was typed.
    pub name: String,
    pub args: BoundArgs,
}

pub struct CommandDescriptor<Ctx> {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub params: &'static [&'static str],
    pub handler: Handler<Ctx>,
}

impl<Ctx> CommandDescriptor<Ctx> {
    /// Canonical name followed by every alias.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

impl<Ctx> fmt::Debug for CommandDescriptor<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

pub struct CommandRegistry<Ctx> {
    commands: Vec<CommandDescriptor<Ctx>>,
    lookup: HashMap<&'static str, usize>,
    help: HelpBook,
    sealed: bool,
}

impl<Ctx> Default for CommandRegistry<Ctx> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            lookup: HashMap::new(),
            help: HelpBook::default(),
            sealed: false,
        }
    }
}

impl<Ctx> CommandRegistry<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: CommandDescriptor<Ctx>) -> anyhow::Result<()> {
        if self.sealed {
            anyhow::bail!(
                "command registry is sealed after help generation (registering {})",
                descriptor.name
            );
        }

        let mut seen = HashSet::new();
        for key in descriptor.keys() {
            if !seen.insert(key) || self.lookup.contains_key(key) {
                anyhow::bail!("duplicate command name or alias: {key}");
            }
        }

        let index = self.commands.len();
        for key in descriptor.keys() {
            self.lookup.insert(key, index);
        }
        self.commands.push(descriptor);
        Ok(())
    }

    /// Renders help for every command registered so far, then registers the help
    /// command itself and seals the registry.
    pub fn register_help(
        &mut self,
        descriptor: CommandDescriptor<Ctx>,
        suggest_prefix: &str,
    ) -> anyhow::Result<HelpBook> {
        let book = HelpBook::from_commands(&self.commands, suggest_prefix);
        self.register(descriptor)?;
        self.help = book.clone();
        self.sealed = true;
        Ok(book)
    }

    /// Exact, case-sensitive lookup by canonical name or alias.
    pub fn resolve(&self, name: &str) -> Option<&CommandDescriptor<Ctx>> {
        self.lookup.get(name).map(|&i| &self.commands[i])
    }

    pub fn describe(&self, name: Option<&str>) -> Result<&[HelpEntry], CommandError> {
        self.help.describe(name)
    }
}
