//! Watch command.
//!
//! Runs the collection pipeline against command-backed collaborators and
//! prints every client message as one JSON line on stdout.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::WatchArgs;
use crate::config::Settings;
use crate::toolchain::CommandToolchain;
use crate::watcher::{
    ClientMessage, CollectionWatcher, Notifier, PipelineOptions, PipelinePaths, ToolchainHandle,
};

/// Apply CLI overrides on top of loaded settings.
pub fn apply_overrides(settings: &mut Settings, args: &WatchArgs) {
    if let Some(ms) = args.debounce_ms {
        settings.watch.debounce_ms = ms;
    }
    if let Some(ms) = args.rename_window_ms {
        settings.watch.rename_window_ms = ms;
    }
    if let Some(ms) = args.max_wait_ms {
        settings.watch.max_wait_ms = Some(ms);
    }
}

pub async fn run_watch(mut settings: Settings, args: WatchArgs) -> anyhow::Result<()> {
    apply_overrides(&mut settings, &args);

    let toolchain = Arc::new(CommandToolchain::from_settings(&settings)?);
    let notifier = Notifier::new(settings.watch.broadcast_capacity);
    let printer = tokio::spawn(print_messages(notifier.subscribe()));

    let paths = PipelinePaths::from_settings(&settings);
    let source_dir = paths.source_dir.clone();

    let watcher = CollectionWatcher::builder()
        .paths(paths)
        .options(PipelineOptions::from_settings(&settings))
        .toolchain(ToolchainHandle::new(toolchain.clone().into_toolchain()))
        .config_reloader(toolchain)
        .notifier(notifier)
        .channel_capacity(settings.watch.channel_capacity)
        .initial_compile(!args.skip_initial_compile)
        .build()
        .with_context(|| format!("starting watcher on {}", source_dir.display()))?;

    eprintln!(
        "Watching {} (debounce: {}ms, rename window: {}ms)",
        source_dir.display(),
        settings.watch.debounce_ms,
        settings.watch.rename_window_ms
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let result = watcher.watch(shutdown).await;
    // The notifier is gone with the watcher, so the printer drains and exits
    finish_printer(printer).await;
    result.context("watcher stopped")
}

/// Wait for the printer task. Returns false if it panicked or was cancelled.
async fn finish_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("[notify] message printer failed: {e}");
            false
        }
    }
}

async fn print_messages(mut receiver: broadcast::Receiver<ClientMessage>) {
    loop {
        match receiver.recv().await {
            Ok(message) => match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("[notify] failed to encode message: {e}"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("[notify] printer lagged by {n} messages");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
