//! YAML configuration file
//!
//! Lives at `<config_dir>/securestore/config.yaml` by default
//! (~/.config on Linux, ~/Library/Application Support on macOS).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

pub const DEFAULT_PASSPHRASE_ENV: &str = "SECURESTORE_PASSPHRASE";
pub const DEFAULT_TOKEN_ENV: &str = "SECURESTORE_RPC_TOKEN";
pub const DEFAULT_SERVICE_PREFIX: &str = "securestore";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Which backend the store should open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Keychain,
    File,
    Rpc,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Keychain => "keychain",
            BackendKind::File => "file",
            BackendKind::Rpc => "rpc",
        }
    }
}

/// Settings for the OS keychain backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeychainSection {
    #[serde(default = "default_service_prefix")]
    pub service_prefix: String,
}

impl Default for KeychainSection {
    fn default() -> Self {
        Self {
            service_prefix: default_service_prefix(),
        }
    }
}

/// Settings for the encrypted file backend
///
/// The passphrase itself never lives in the config file, only the name of
/// the environment variable holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSection {
    /// Vault location; defaults to `<data_dir>/securestore/secrets.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_passphrase_env")]
    pub passphrase_env: String,
}

impl Default for FileSection {
    fn default() -> Self {
        Self {
            path: None,
            passphrase_env: default_passphrase_env(),
        }
    }
}

impl FileSection {
    /// The configured vault path, or the platform default
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("securestore")
                .join("secrets.json")
        })
    }
}

/// Settings for the RPC backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
    #[serde(default = "default_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            socket_path: None,
            auth_token_env: default_token_env(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_service_prefix() -> String {
    DEFAULT_SERVICE_PREFIX.to_string()
}

fn default_passphrase_env() -> String {
    DEFAULT_PASSPHRASE_ENV.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Configuration file structure
///
/// # Example
///
/// ```
/// use securestore_core::config::{BackendKind, StoreConfig};
///
/// let config = StoreConfig::from_yaml_str("backend: keychain\n").unwrap();
/// assert_eq!(config.backend, BackendKind::Keychain);
/// assert_eq!(config.keychain.service_prefix, "securestore");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub keychain: KeychainSection,
    #[serde(default)]
    pub file: FileSection,
    #[serde(default)]
    pub rpc: RpcSection,
}

impl StoreConfig {
    /// Default config path (`<config_dir>/securestore/config.yaml`)
    pub fn default_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("securestore").join("config.yaml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from a file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load config from the default location
    pub fn load_default() -> ConfigResult<Self> {
        Self::load(Self::default_path()?)
    }

    /// Parse and validate config from YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        // An empty document parses as null, not as an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: StoreConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.validate()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend == BackendKind::Rpc
            && self.rpc.socket_path.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::Invalid("rpc backend requires rpc.socket_path".to_string()));
        }
        if self.rpc.timeout_ms == 0 {
            return Err(ConfigError::Invalid("rpc.timeout_ms must be greater than zero".to_string()));
        }
        if self.keychain.service_prefix.is_empty() {
            return Err(ConfigError::Invalid("keychain.service_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}
