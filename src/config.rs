//! Configuration for the collection watcher.
//!
//! Settings are layered:
//! - Default values
//! - TOML configuration file (`collection-watch.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the caller)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CW_` and use double underscores
//! to separate nested levels:
//! - `CW_WATCH__DEBOUNCE_MS=75` sets `watch.debounce_ms`
//! - `CW_CACHE__ENABLED=true` sets `cache.enabled`
//! - `CW_COLLECTIONS__SOURCE_DIR=src/collections` sets `collections.source_dir`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file name, looked up in the workspace root.
pub const SETTINGS_FILE: &str = "collection-watch.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root; relative paths below resolve against it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub collections: CollectionsConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// External commands backing the compiler, cache and registry
    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CollectionsConfig {
    /// Directory holding user-authored collection sources
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Directory the compiler writes artifacts into
    #[serde(default = "default_compiled_dir")]
    pub compiled_dir: PathBuf,

    /// Configuration file that triggers a full client reload when changed
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,

    /// Source file extensions that enter the pipeline
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Quiet period before a burst of events settles
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a deletion waits for a matching create before it stands alone
    #[serde(default = "default_rename_window_ms")]
    pub rename_window_ms: u64,

    /// Upper bound on how long a busy window may stay open. Unset means no cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<u64>,

    /// Capacity of the filesystem event queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of the client broadcast channel
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// Key pattern cleared after every successful compile
    #[serde(default = "default_cache_pattern")]
    pub pattern: String,
}

/// Argv lists for the external collaborators.
///
/// Placeholders: `{source}`, `{output}`, `{pattern}`, `{force}`, `{path}`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CommandsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_clear: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_update: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types_generate: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_reload: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `collection_watch::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_source_dir() -> PathBuf {
    PathBuf::from("config/collections")
}
fn default_compiled_dir() -> PathBuf {
    PathBuf::from("compiledCollections")
}
fn default_config_file() -> PathBuf {
    PathBuf::from("config/roles.ts")
}
fn default_extensions() -> Vec<String> {
    vec!["ts".to_string(), "js".to_string()]
}
fn default_debounce_ms() -> u64 {
    50
}
fn default_rename_window_ms() -> u64 {
    100
}
fn default_channel_capacity() -> usize {
    256
}
fn default_broadcast_capacity() -> usize {
    64
}
fn default_cache_pattern() -> String {
    "api:content-structure:*".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            collections: CollectionsConfig::default(),
            watch: WatchConfig::default(),
            cache: CacheConfig::default(),
            commands: CommandsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            compiled_dir: default_compiled_dir(),
            config_file: default_config_file(),
            extensions: default_extensions(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            rename_window_ms: default_rename_window_ms(),
            max_wait_ms: None,
            channel_capacity: default_channel_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pattern: default_cache_pattern(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rename_window(&self) -> Duration {
        Duration::from_millis(self.rename_window_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}

impl Settings {
    /// Load configuration from the workspace settings file plus environment.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(SETTINGS_FILE)
    }

    /// Load configuration from a specific file.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed("CW_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Workspace root, falling back to the current directory.
    pub fn root(&self) -> PathBuf {
        self.workspace_root.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.resolve(&self.collections.source_dir)
    }

    pub fn compiled_dir(&self) -> PathBuf {
        self.resolve(&self.collections.compiled_dir)
    }

    pub fn config_file(&self) -> PathBuf {
        self.resolve(&self.collections.config_file)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file at `path`.
    pub fn init_config_file(
        path: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = path.as_ref().to_path_buf();

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
