//! Collaborators backed by external commands.
//!
//! Each step is an argv list from `[commands]` in the settings file. Before
//! running, `{source}`, `{output}`, `{pattern}`, `{force}` and `{path}` are
//! substituted inside every argument.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::process::Command;

use crate::config::Settings;
use crate::watcher::{
    CacheLayer, Compiler, ConfigReloader, ContentRegistry, OrphanCleaner, Toolchain, TypeGenerator,
};

/// One configured command.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: &'static str,
    argv: Vec<String>,
}

impl CommandStep {
    pub fn new(name: &'static str, argv: Vec<String>) -> anyhow::Result<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            bail!("commands.{name} must name a program");
        }
        Ok(Self { name, argv })
    }

    fn optional(name: &'static str, argv: Option<&Vec<String>>) -> anyhow::Result<Option<Self>> {
        argv.map(|argv| Self::new(name, argv.clone())).transpose()
    }

    /// Argv with placeholders filled in.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }

    /// Run to completion in `cwd`. A non-zero exit is an error carrying stderr.
    pub async fn run(&self, cwd: &Path, vars: &[(&str, &str)]) -> anyhow::Result<()> {
        let argv = self.render(vars);
        crate::debug_event!(self.name, "running", "{}", argv.join(" "));

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to spawn {} command `{}`", self.name, argv[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} command exited with {}: {}", self.name, output.status, stderr.trim());
        }
        Ok(())
    }
}

/// Every collaborator, implemented by shelling out.
#[derive(Debug)]
pub struct CommandToolchain {
    root: PathBuf,
    compile: CommandStep,
    cleanup: Option<CommandStep>,
    cache_clear: Option<CommandStep>,
    cache_enabled: bool,
    registry_update: Option<CommandStep>,
    types_generate: Option<CommandStep>,
    config_reload: Option<CommandStep>,
}

impl CommandToolchain {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let commands = &settings.commands;
        let compile = commands
            .compile
            .clone()
            .context("commands.compile is not configured")?;

        let cache_clear = CommandStep::optional("cache_clear", commands.cache_clear.as_ref())?;
        if settings.cache.enabled && cache_clear.is_none() {
            tracing::warn!("[toolchain] cache enabled but commands.cache_clear is not set");
        }

        Ok(Self {
            root: settings.root(),
            compile: CommandStep::new("compile", compile)?,
            cleanup: CommandStep::optional("cleanup", commands.cleanup.as_ref())?,
            cache_enabled: settings.cache.enabled && cache_clear.is_some(),
            cache_clear,
            registry_update: CommandStep::optional(
                "registry_update",
                commands.registry_update.as_ref(),
            )?,
            types_generate: CommandStep::optional("types_generate", commands.types_generate.as_ref())?,
            config_reload: CommandStep::optional("config_reload", commands.config_reload.as_ref())?,
        })
    }

    /// Share one instance across every collaborator slot.
    pub fn into_toolchain(self: Arc<Self>) -> Toolchain {
        Toolchain {
            compiler: self.clone(),
            cleaner: self.clone(),
            cache: self.clone(),
            registry: self.clone(),
            types: self,
        }
    }

    async fn run_optional(&self, step: Option<&CommandStep>, vars: &[(&str, &str)]) -> anyhow::Result<()> {
        match step {
            Some(step) => step.run(&self.root, vars).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Compiler for CommandToolchain {
    async fn compile(&self, source_dir: &Path, output_dir: &Path) -> anyhow::Result<()> {
        let source = source_dir.display().to_string();
        let output = output_dir.display().to_string();
        self.compile
            .run(&self.root, &[("source", source.as_str()), ("output", output.as_str())])
            .await
    }
}

#[async_trait]
impl OrphanCleaner for CommandToolchain {
    async fn cleanup_orphaned_files(
        &self,
        source_dir: &Path,
        output_dir: &Path,
    ) -> anyhow::Result<()> {
        let source = source_dir.display().to_string();
        let output = output_dir.display().to_string();
        self.run_optional(
            self.cleanup.as_ref(),
            &[("source", source.as_str()), ("output", output.as_str())],
        )
        .await
    }
}

#[async_trait]
impl CacheLayer for CommandToolchain {
    fn is_enabled(&self) -> bool {
        self.cache_enabled
    }

    async fn clear(&self, pattern: &str) -> anyhow::Result<()> {
        self.run_optional(self.cache_clear.as_ref(), &[("pattern", pattern)])
            .await
    }
}

#[async_trait]
impl ContentRegistry for CommandToolchain {
    async fn update(&self, force_reload: bool) -> anyhow::Result<()> {
        let force = force_reload.to_string();
        self.run_optional(self.registry_update.as_ref(), &[("force", force.as_str())])
            .await
    }
}

#[async_trait]
impl TypeGenerator for CommandToolchain {
    async fn generate(&self) -> anyhow::Result<()> {
        self.run_optional(self.types_generate.as_ref(), &[]).await
    }
}

#[async_trait]
impl ConfigReloader for CommandToolchain {
    async fn reload(&self, config_file: &Path) -> anyhow::Result<()> {
        let path = config_file.display().to_string();
        self.run_optional(self.config_reload.as_ref(), &[("path", path.as_str())])
            .await
    }
}
