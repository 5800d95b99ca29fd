//! Concrete collaborators for the command-line watcher.

mod command;

pub use command::{CommandStep, CommandToolchain};
