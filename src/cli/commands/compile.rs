//! One-shot compile command.

use anyhow::Context;

use crate::config::Settings;
use crate::toolchain::CommandToolchain;
use crate::watcher::compile::recompile;

/// Compile the whole collection tree once.
pub async fn run_compile(settings: &Settings) -> anyhow::Result<()> {
    let toolchain = CommandToolchain::from_settings(settings)?;
    let source_dir = settings.source_dir();
    let compiled_dir = settings.compiled_dir();

    let elapsed = recompile(&toolchain, &source_dir, &compiled_dir)
        .await
        .into_result()
        .with_context(|| format!("compiling {}", source_dir.display()))?;

    println!(
        "Compiled {} -> {} in {} ms",
        source_dir.display(),
        compiled_dir.display(),
        elapsed.as_millis()
    );
    Ok(())
}
