//!
//! The on-disk layout shared by every process: a per-user base directory
//! holding the advisory lock file, the `data/` directory of replica
//! logs, the two JSON config files and the sync trust anchor.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{random_string, APP_ID_LEN, TOKEN_LEN};

/// The per-user base directory, `$HOME/.gtd`, overridable through
/// `GTD_HOME`.
pub fn base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GTD_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".gtd")
}

pub fn lock_file() -> PathBuf {
    base_dir().join("lock")
}

pub fn data_dir() -> PathBuf {
    base_dir().join("data")
}

pub fn local_config_file() -> PathBuf {
    base_dir().join("local.conf.json")
}

pub fn sync_config_file() -> PathBuf {
    base_dir().join("sync.conf.json")
}

/// TLS trust anchor the sync client pins.
pub fn certificate_file() -> PathBuf {
    base_dir().join("server.crt")
}

pub fn ensure_data_dir() -> io::Result<()> {
    fs::create_dir_all(data_dir())
}

/// Create the lock file if it is missing. Losing the creation race to
/// another process is expected; one retry settles it.
pub fn ensure_lock_file() -> io::Result<()> {
    let path = lock_file();
    if path.is_file() {
        return Ok(());
    }
    fs::create_dir_all(base_dir())?;
    match OpenOptions::new().append(true).create(true).open(&path) {
        Ok(_) => Ok(()),
        Err(err) if path.is_file() => {
            tracing::debug!(%err, "lock file appeared while creating it");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Identity of this installation: the replica id its log file is named
/// after and the secret UIs authenticate with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub app_id: String,
    pub local_auth: String,
}

impl LocalConfig {
    /// Load the local identity, minting a fresh one on first run. The
    /// file is created user-readable only.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match fs::read(path) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let config = Self {
                    app_id: random_string(APP_ID_LEN),
                    local_auth: random_string(TOKEN_LEN),
                };
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(path)?;
                file.write_all(serde_json::to_string_pretty(&config)?.as_bytes())?;
                Ok(config)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Where and as whom to sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub host: String,
    pub port: u16,
    pub sync_auth: String,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }
}
