use clap::Parser;
use std::path::PathBuf;

use collection_watch::Settings;
use collection_watch::cli::commands::{compile, init, watch};
use collection_watch::cli::{Cli, Commands};
use collection_watch::config::SETTINGS_FILE;
use collection_watch::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));

    if let Commands::Init { force } = cli.command {
        if let Err(e) = init::run_init(&config_path, force) {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    let settings = match Settings::load_from(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error in {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };
    logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => init::run_config(&settings),
        Commands::Compile => compile::run_compile(&settings).await,
        Commands::Watch(args) => watch::run_watch(settings, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
