use super::registry::{BoundArgs, CommandCall, CommandRegistry};

/// A parsed command name plus its raw argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub enum Dispatch {
    /// Ordinary chat: no recognised prefix, or a prefix with nothing after it.
    Ignored,
    Handled {
        name: String,
    },
    NotFound {
        name: String,
    },
    Failed {
        name: String,
        error: anyhow::Error,
    },
}

/// Space-separated tokens after trimming; runs of spaces count as one separator.
/// There is no quoting, so an argument can never contain a space.
pub fn tokenize(raw: &str) -> Vec<&str> {
    raw.trim().split(' ').filter(|t| !t.is_empty()).collect()
}

pub struct MessageRouter<Ctx> {
    prefixes: Vec<String>,
    registry: CommandRegistry<Ctx>,
}

impl<Ctx> MessageRouter<Ctx> {
    pub fn new<P: Into<String>>(
        prefixes: impl IntoIterator<Item = P>,
        registry: CommandRegistry<Ctx>,
    ) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            registry,
        }
    }

    pub fn registry(&self) -> &CommandRegistry<Ctx> {
        &self.registry
    }

    pub fn route(&self, raw: &str) -> Option<Invocation> {
        let tokens = tokenize(raw);
        let (prefix, rest) = tokens.split_first()?;
        if !self.prefixes.iter().any(|p| p == prefix) {
            return None;
        }
        let (name, args) = rest.split_first()?;
        Some(Invocation {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    /// Parses `raw`, binds its arguments and runs the matching handler to completion.
    pub async fn dispatch(&self, ctx: &mut Ctx, invoker: &str, raw: &str) -> Dispatch {
        let Some(invocation) = self.route(raw) else {
            return Dispatch::Ignored;
        };
        let Some(command) = self.registry.resolve(&invocation.name) else {
            return Dispatch::NotFound {
                name: invocation.name,
            };
        };

        let call = CommandCall {
            invoker: invoker.to_string(),
            name: command.name.to_string(),
            args: BoundArgs::bind(command.params, &invocation.args),
        };
        match (command.handler)(ctx, call).await {
            Ok(()) => Dispatch::Handled {
                name: command.name.to_string(),
            },
            Err(error) => Dispatch::Failed {
                name: command.name.to_string(),
                error,
            },
        }
    }
}
