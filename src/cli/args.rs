//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Collection source watcher
#[derive(Parser, Debug)]
#[command(
    name = "collection-watch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Recompile collections on change and keep caches and clients in sync",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  collection-watch init\n  collection-watch compile\n  collection-watch watch --debounce-ms 75\n  RUST_LOG=debug collection-watch watch"
)]
pub struct Cli {
    /// Path to a custom settings file
    #[arg(short, long, global = true, env = "CW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective settings
    Config,

    /// Compile the collection tree once and exit
    Compile,

    /// Watch collection sources and reconcile changes until interrupted
    Watch(WatchArgs),
}

/// Overrides for the watch command.
#[derive(clap::Args, Debug, Default)]
pub struct WatchArgs {
    /// Quiet period before a burst of events is processed
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// How long a deletion waits for a matching create
    #[arg(long, value_name = "MS")]
    pub rename_window_ms: Option<u64>,

    /// Force a busy window to settle after this long
    #[arg(long, value_name = "MS")]
    pub max_wait_ms: Option<u64>,

    /// Start watching without compiling first
    #[arg(long)]
    pub skip_initial_compile: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_overrides_parse() {
        let cli = Cli::try_parse_from([
            "collection-watch",
            "--config",
            "site.toml",
            "watch",
            "--debounce-ms",
            "75",
            "--skip-initial-compile",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch command");
        };
        assert_eq!(args.debounce_ms, Some(75));
        assert!(args.rename_window_ms.is_none());
        assert!(args.skip_initial_compile);
    }
}
