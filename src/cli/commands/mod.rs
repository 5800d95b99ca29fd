//! Command implementations for the CLI.

pub mod compile;
pub mod init;
pub mod watch;
