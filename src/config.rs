//! Node configuration
//!
//! Read from a JSON file; every field has a default so a partial file (or no
//! file at all) is accepted.

use crate::storage::StorageConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger file
    pub blockchain: PathBuf,
    /// Wallet file
    pub wallet: PathBuf,
    /// Address credited by mined blocks (empty: first wallet key)
    #[serde(rename = "mining-addr")]
    pub mining_addr: String,
    /// HTTP listen address
    #[serde(rename = "listen-addr")]
    pub listen_addr: String,
    /// Capacity of the transfer order queue
    #[serde(rename = "order-queue")]
    pub order_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blockchain: PathBuf::from(".blocks.dat"),
            wallet: PathBuf::from("wallet.json"),
            mining_addr: String::new(),
            listen_addr: "127.0.0.1:8080".to_string(),
            order_queue: 16,
        }
    }
}

impl Config {
    /// Load the configuration; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig {
            path: self.blockchain.clone(),
        }
    }
}
