/// User-facing failures of a chat command. Each one is reported back on the chat
/// channel and never ends the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Malformed arguments or an unparsable number.
    Parse(String),
    /// No entity of the requested kind/name in the current world snapshot.
    NotFound { kind: String, target: String },
    /// Position or rotation components missing for a full pose.
    IncompletePose(String),
    CommandNotFound(String),
}

impl CommandError {
    pub fn parse(msg: impl Into<String>) -> Self {
        CommandError::Parse(msg.into())
    }

    pub fn not_found(kind: impl Into<String>, target: impl Into<String>) -> Self {
        CommandError::NotFound {
            kind: kind.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Parse(msg) => write!(f, "invalid input: {msg}"),
            CommandError::NotFound { kind, target } => {
                write!(f, "no {kind} found matching '{target}'")
            }
            CommandError::IncompletePose(what) => {
                write!(f, "incomplete pose for {what}: need <x>,<y>,<z>/<yaw>,<pitch>")
            }
            CommandError::CommandNotFound(name) => write!(f, "Command not found: {name}"),
        }
    }
}

impl std::error::Error for CommandError {}
