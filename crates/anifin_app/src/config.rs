//! Layered configuration: RON file, then environment, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anifin_engine::aniworld::AniworldSettings;
use anifin_engine::{
    FetchSettings, SshSettings, DEFAULT_CONCURRENT_FRAGMENTS, DEFAULT_PROGRAM,
    DEFAULT_REMOTE_PATH, DEFAULT_SSH_PORT, DEFAULT_USER_AGENT,
};
use engine_logging::engine_info;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_page_bytes: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            probe_timeout_secs: 10,
            redirect_limit: 5,
            max_page_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub remote_path: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_terminal: bool,
    pub download_path: PathBuf,
    pub auto_upload: bool,
    pub default_language: String,
    pub fallback_language: Option<String>,
    pub default_provider: String,
    pub fetch_program: String,
    pub concurrent_fragments: u32,
    pub network: NetworkConfig,
    pub ssh: SshConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let aniworld = AniworldSettings::default();
        Self {
            log_level: "info".to_string(),
            log_to_terminal: false,
            download_path: aniworld.download_dir,
            auto_upload: aniworld.auto_upload,
            default_language: aniworld.default_language,
            fallback_language: aniworld.fallback_language,
            default_provider: "voe".to_string(),
            fetch_program: DEFAULT_PROGRAM.to_string(),
            concurrent_fragments: DEFAULT_CONCURRENT_FRAGMENTS,
            network: NetworkConfig::default(),
            ssh: SshConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with `path` (if any) and then the process
    /// environment. `.env` must already be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        engine_info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies the recognised environment variables. Unset or empty
    /// variables leave the current value alone.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("DOWNLOAD_PATH") {
            self.download_path = PathBuf::from(value);
        }
        if let Some(value) = get("AUTO_UPLOAD") {
            self.auto_upload = parse_bool("AUTO_UPLOAD", &value)?;
        }
        if let Some(value) = get("DEFAULT_LANGUAGE") {
            self.default_language = value;
        }
        if let Some(value) = get("FALLBACK_LANGUAGE") {
            self.fallback_language = Some(value);
        }
        if let Some(value) = get("SSH_ENABLED") {
            self.ssh.enabled = parse_bool("SSH_ENABLED", &value)?;
        }
        if let Some(value) = get("SSH_HOST") {
            self.ssh.host = value;
        }
        if let Some(value) = get("SSH_PORT") {
            self.ssh.port = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "SSH_PORT",
                value: value.clone(),
            })?;
        }
        if let Some(value) = get("SSH_USERNAME") {
            self.ssh.username = value;
        }
        if let Some(value) = get("SSH_REMOTE_PATH") {
            self.ssh.remote_path = value;
        }
        Ok(())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.network.request_timeout_secs),
            probe_timeout: Duration::from_secs(self.network.probe_timeout_secs),
            redirect_limit: self.network.redirect_limit,
            max_bytes: self.network.max_page_bytes,
            user_agent: self.network.user_agent.clone(),
        }
    }

    pub fn aniworld_settings(&self) -> AniworldSettings {
        AniworldSettings {
            download_dir: self.download_path.clone(),
            default_language: self.default_language.clone(),
            fallback_language: self.fallback_language.clone(),
            auto_upload: self.auto_upload,
        }
    }

    pub fn ssh_settings(&self) -> SshSettings {
        SshSettings {
            enabled: self.ssh.enabled,
            host: self.ssh.host.clone(),
            port: self.ssh.port,
            username: self.ssh.username.clone(),
            remote_path: self.ssh.remote_path.clone(),
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key,
            value: value.to_string(),
        }),
    }
}
