//! Chat command surface: prefix routing, alias lookup and generated help.
//!
//! Commands are a small fixed set with positional arguments. The registry is built
//! once at startup and handed to the router; nothing here is process-global.

pub mod help;
pub mod registry;
pub mod router;

pub use help::{HelpBook, HelpEntry};
pub use registry::{
    BoundArgs, CommandCall, CommandDescriptor, CommandRegistry, Handler, HandlerFuture,
};
pub use router::{Dispatch, Invocation, MessageRouter};
