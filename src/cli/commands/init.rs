//! Init and Config commands.

use std::path::Path;

use anyhow::anyhow;

use crate::config::Settings;

/// Write the default settings file.
pub fn run_init(config_path: &Path, force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(config_path, force).map_err(|e| anyhow!("{e}"))?;
    if force {
        println!("Wrote configuration file at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Set [commands].compile before running `collection-watch watch`.");
    Ok(())
}

/// Print the effective configuration.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(settings)?;
    println!("{rendered}");
    Ok(())
}
