//! Inbound chat commands: parsing and platform context.

pub mod context;
pub mod parser;

pub use context::CommandContext;
pub use parser::{ChatCommand, Command, CommandError, USAGE, parse_command};
