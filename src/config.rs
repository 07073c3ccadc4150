//! WolfSync Configuration
//!
//! Every fixed path and external tool name used by a run lives here, so the
//! orchestrator never reaches for global state and tests can point it at a
//! scratch directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wolfsync/wolfsync.toml";

/// Main WolfSync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// HA role source
    #[serde(default)]
    pub ha: HaConfig,

    /// What gets replicated
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Where it gets replicated to
    #[serde(default)]
    pub remote: RemoteConfig,

    /// External programs
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HA role configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaConfig {
    /// TOML file holding this node's role and peer address
    #[serde(default = "default_role_file")]
    pub role_file: PathBuf,
}

/// Replication path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Directories always replicated, in this order
    #[serde(default = "default_base_paths")]
    pub base_paths: Vec<PathBuf>,

    /// Root holding `<tenant>/<subdir>` sound directories
    #[serde(default = "default_tenant_sounds_root")]
    pub tenant_sounds_root: PathBuf,

    /// Tenant subdirectories that are never replicated
    #[serde(default = "default_excluded_subdirs")]
    pub excluded_subdirs: Vec<String>,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Account used on the standby
    #[serde(default = "default_remote_user")]
    pub user: String,

    /// Destination root on the standby
    #[serde(default = "default_remote_root")]
    pub root: String,

    /// Private half of the trust key pair
    #[serde(default = "default_identity_file")]
    pub identity_file: PathBuf,
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_rsync")]
    pub rsync: String,

    #[serde(default = "default_ssh")]
    pub ssh: String,

    #[serde(default = "default_ssh_keygen")]
    pub ssh_keygen: String,

    #[serde(default = "default_ssh_copy_id")]
    pub ssh_copy_id: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

// Default value functions
fn default_role_file() -> PathBuf {
    PathBuf::from("/etc/wolfsync/ha.toml")
}

fn default_base_paths() -> Vec<PathBuf> {
    [
        "/etc/asterisk/scripts",
        "/var/lib/asterisk/agi-bin",
        "/var/lib/asterisk/moh",
        "/etc/asterisk/keys",
        "/root/.aws",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_tenant_sounds_root() -> PathBuf {
    PathBuf::from("/var/lib/asterisk/sounds/tenants")
}

fn default_excluded_subdirs() -> Vec<String> {
    vec!["monitor".to_string(), "recording".to_string()]
}

fn default_remote_user() -> String {
    "root".to_string()
}

fn default_remote_root() -> String {
    "/".to_string()
}

fn default_identity_file() -> PathBuf {
    PathBuf::from("/root/.ssh/wolfsync_ed25519")
}

fn default_rsync() -> String {
    "rsync".to_string()
}

fn default_ssh() -> String {
    "ssh".to_string()
}

fn default_ssh_keygen() -> String {
    "ssh-keygen".to_string()
}

fn default_ssh_copy_id() -> String {
    "ssh-copy-id".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/wolfsync.log")
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            role_file: default_role_file(),
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            base_paths: default_base_paths(),
            tenant_sounds_root: default_tenant_sounds_root(),
            excluded_subdirs: default_excluded_subdirs(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            user: default_remote_user(),
            root: default_remote_root(),
            identity_file: default_identity_file(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            rsync: default_rsync(),
            ssh: default_ssh(),
            ssh_keygen: default_ssh_keygen(),
            ssh_copy_id: default_ssh_copy_id(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.remote.user.trim().is_empty() {
            return Err(Error::Config("remote.user cannot be empty".into()));
        }
        if self.remote.root.trim().is_empty() {
            return Err(Error::Config("remote.root cannot be empty".into()));
        }
        if !self.replication.tenant_sounds_root.is_absolute() {
            return Err(Error::Config(format!(
                "replication.tenant_sounds_root must be absolute: {}",
                self.replication.tenant_sounds_root.display()
            )));
        }
        if let Some(path) = self.replication.base_paths.iter().find(|p| !p.is_absolute()) {
            return Err(Error::Config(format!(
                "replication.base_paths entries must be absolute: {}",
                path.display()
            )));
        }
        if self.replication.excluded_subdirs.iter().any(|s| s.is_empty() || s.contains('/')) {
            return Err(Error::Config(
                "replication.excluded_subdirs entries must be single path segments".into(),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(Error::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Public half of the trust key pair
    pub fn public_key_file(&self) -> PathBuf {
        let mut name = self.remote.identity_file.clone().into_os_string();
        name.push(".pub");
        PathBuf::from(name)
    }

    /// `user@host` login for the peer
    pub fn login(&self, remote_address: &str) -> String {
        format!("{}@{}", self.remote.user, remote_address)
    }

    /// rsync destination (`user@host:root`) for the peer
    pub fn destination(&self, remote_address: &str) -> String {
        format!("{}:{}", self.login(remote_address), self.remote.root)
    }
}
