//! Wallet implementation for the ledger
//!
//! A wallet is an ordered set of signing keys. The first key receives change
//! from transfers. Wallets are stored as JSON next to the ledger.

use crate::crypto::KeyPair;
use log::info;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
    #[error("Stored address {stored} does not match its key ({derived})")]
    AddressMismatch { stored: String, derived: String },
    #[error("No key for address {0}")]
    UnknownAddress(String),
    #[error("Wallet has no keys")]
    Empty,
}

/// Serializable key entry
#[derive(Debug, Serialize, Deserialize)]
struct KeyData {
    private_key_hex: String,
    address: String,
}

/// Serializable wallet data for persistence
#[derive(Debug, Default, Serialize, Deserialize)]
struct WalletData {
    keys: Vec<KeyData>,
}

/// A set of signing keys
#[derive(Debug, Clone, Default)]
pub struct Wallet {
    keys: Vec<KeyPair>,
}

impl Wallet {
    /// Create a wallet without keys
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, key: KeyPair) {
        self.keys.push(key);
    }

    /// Generate a fresh key, add it and return it
    pub fn generate_key(&mut self) -> &KeyPair {
        self.keys.push(KeyPair::generate());
        &self.keys[self.keys.len() - 1]
    }

    pub fn keys(&self) -> &[KeyPair] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.keys.iter().map(KeyPair::address).collect()
    }

    /// Find the key owning `address`
    pub fn key_by_address(&self, address: &str) -> Option<&KeyPair> {
        self.keys.iter().find(|k| k.address() == address)
    }

    /// Public key for `address`; an empty address selects the first key
    pub fn public_key_by_address(&self, address: &str) -> Result<PublicKey, WalletError> {
        if address.is_empty() {
            return self
                .keys
                .first()
                .map(|k| k.public_key)
                .ok_or(WalletError::Empty);
        }
        self.key_by_address(address)
            .map(|k| k.public_key)
            .ok_or_else(|| WalletError::UnknownAddress(address.to_string()))
    }

    /// Public information for every key
    pub fn export_public_info(&self) -> Vec<WalletInfo> {
        self.keys
            .iter()
            .map(|k| WalletInfo {
                address: k.address(),
                public_key: hex::encode(k.public_key_bytes()),
            })
            .collect()
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            keys: self
                .keys
                .iter()
                .map(|k| KeyData {
                    private_key_hex: k.private_key_hex(),
                    address: k.address(),
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file; a missing file is an empty wallet
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No wallet at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::new();
        for entry in data.keys {
            let key = KeyPair::from_private_key_hex(&entry.private_key_hex)?;
            let derived = key.address();
            if derived != entry.address {
                return Err(WalletError::AddressMismatch {
                    stored: entry.address,
                    derived,
                });
            }
            wallet.add_key(key);
        }
        Ok(wallet)
    }
}

/// Public key information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub public_key: String,
}
