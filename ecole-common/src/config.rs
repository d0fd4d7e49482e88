//! Configuration loading and root folder resolution
//!
//! Settings come from, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable (`ECOLE_ROOT_FOLDER`, `ECOLE_API_URL`)
//! 3. TOML config file (`~/.config/ecole/config.toml`, then `/etc/ecole/config.toml`)
//! 4. Compiled defaults
//!
//! A missing or unreadable config file is never fatal: a warning is logged and
//! the compiled defaults apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "ECOLE_ROOT_FOLDER";

/// Environment variable overriding the backend URL used by the client
pub const API_URL_ENV: &str = "ECOLE_API_URL";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "ecole.db";

/// Client session file name inside the root folder
pub const SESSION_FILE: &str = "session.json";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and the client session
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Default: 5740
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve the idempotent `ensure/` endpoints
    #[serde(default = "default_true")]
    pub ensure_endpoints: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ensure_endpoints: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    format!("http://127.0.0.1:{}", default_port())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// First existing config file among the standard locations
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ecole").join("config.toml"));
    let system_config = PathBuf::from("/etc/ecole/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|p| p.exists())
}

/// Load the config from `explicit` or the standard locations, degrading to
/// defaults when nothing usable is found.
pub fn load_config(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit.map(Path::to_path_buf).or_else(find_config_file) {
        Some(p) => p,
        None => {
            debug!("No config file found, using defaults");
            return TomlConfig::default();
        }
    };

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ecole"))
        .unwrap_or_else(|| PathBuf::from("./ecole_data"))
}

/// Resolves the root folder by priority
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<&Path>) -> Self {
        self.cli_arg = path.map(Path::to_path_buf);
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Some(path) = env_value(ROOT_FOLDER_ENV) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.toml_value {
            return path.clone();
        }
        default_root_folder()
    }
}

/// Backend URL for the client: CLI, then environment, then config
pub fn resolve_api_url(cli_arg: Option<&str>, config: &TomlConfig) -> String {
    let url = cli_arg
        .map(str::to_string)
        .or_else(|| env_value(API_URL_ENV))
        .unwrap_or_else(|| config.client.api_url.clone());
    url.trim_end_matches('/').to_string()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Creates the root folder on first run and hands out paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_directory(&self) -> Result<()> {
        if !self.root.exists() {
            info!("Creating root folder {}", self.root.display());
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }
}
