//! Ledger persistence layer
//!
//! The ledger file holds `last_index` followed by every block in order.
//! Loading stops at the block whose index equals `last_index`. The pending
//! queue is never written.

use crate::core::{Block, Blockchain};
use crate::storage::codec::{self, CodecError};
use bytes::BytesMut;
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed ledger file: {0}")]
    Format(#[from] CodecError),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Ledger file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".blocks.dat"),
        }
    }
}

/// Ledger storage manager
#[derive(Debug, Clone)]
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Save the ledger to disk
    ///
    /// The file is written next to the target and renamed over it, so a
    /// failed save leaves the previous ledger intact.
    pub fn save(&self, blockchain: &Blockchain) -> Result<(), StorageError> {
        let path = self.path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        save_to_file(blockchain, &temp_path)?;
        fs::rename(&temp_path, path)?;

        info!(
            "Saved {} block(s) to {}",
            blockchain.blocks().len(),
            path.display()
        );
        Ok(())
    }

    /// Load the ledger from disk; a missing file is an empty ledger
    pub fn load(&self) -> Result<Blockchain, StorageError> {
        if !self.exists() {
            info!("No ledger at {}, starting empty", self.path().display());
            return Ok(Blockchain::new());
        }
        load_from_file(self.path())
    }

    /// Check if a saved ledger exists
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Delete the saved ledger
    pub fn delete(&self) -> Result<(), StorageError> {
        if self.exists() {
            fs::remove_file(self.path())?;
        }
        Ok(())
    }
}

/// Serialize the ledger into its file layout
pub fn encode_ledger(blockchain: &Blockchain) -> Result<BytesMut, StorageError> {
    let mut buf = BytesMut::new();
    codec::put_u64(&mut buf, blockchain.last_index());
    for block in blockchain.blocks() {
        block.encode(&mut buf)?;
    }
    Ok(buf)
}

/// Parse a ledger file image
///
/// An image holding only a zero `last_index` is an empty ledger. Anything
/// else must contain blocks up to and including `last_index`.
pub fn decode_ledger(mut data: &[u8]) -> Result<Blockchain, StorageError> {
    let last_index = codec::get_u64(&mut data)?;
    if data.is_empty() {
        if last_index != 0 {
            return Err(CodecError::Truncated {
                needed: 8,
                remaining: 0,
            }
            .into());
        }
        return Ok(Blockchain::new());
    }

    let mut blocks = Vec::new();
    loop {
        let block = Block::decode(&mut data)?;
        let index = block.index;
        blocks.push(block);
        if index == last_index {
            break;
        }
    }

    if !data.is_empty() {
        debug!("Ignoring {} trailing byte(s) after last block", data.len());
    }
    Ok(Blockchain::from_blocks(last_index, blocks))
}

/// Save ledger to a specific file path
pub fn save_to_file(blockchain: &Blockchain, path: &Path) -> Result<(), StorageError> {
    let buf = encode_ledger(blockchain)?;
    fs::write(path, &buf)?;
    Ok(())
}

/// Load ledger from a specific file path
pub fn load_from_file(path: &Path) -> Result<Blockchain, StorageError> {
    let data = fs::read(path)?;
    decode_ledger(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransferOrder;
    use crate::wallet::Wallet;

    fn storage_in(dir: &Path) -> Storage {
        Storage::new(StorageConfig {
            path: dir.join("chain.dat"),
        })
    }

    fn funded_chain(w1: &Wallet, w2: &Wallet) -> Blockchain {
        let mut chain = Blockchain::new();
        chain.mine(&w1.keys()[0].public_key).unwrap();
        let order = TransferOrder {
            addr: w2.keys()[0].address(),
            amount: 50.0,
        };
        let txn = chain.build_transfer(w1, &order).unwrap();
        chain.queue_transaction(txn);
        chain.mine(&w1.keys()[0].public_key).unwrap();
        chain
    }

    #[test]
    fn test_save_load_blockchain() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path());

        let mut w1 = Wallet::new();
        w1.generate_key();
        let mut w2 = Wallet::new();
        w2.generate_key();
        let chain = funded_chain(&w1, &w2);
        assert_eq!(chain.balance(&w1), 150.0);
        assert_eq!(chain.balance(&w2), 50.0);

        storage.save(&chain).unwrap();
        assert!(storage.exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.last_index(), chain.last_index());
        assert_eq!(loaded.blocks(), chain.blocks());
        for (a, b) in loaded.blocks().iter().zip(chain.blocks()) {
            assert_eq!(a.hash(), b.hash());
            for (ta, tb) in a.transactions().iter().zip(b.transactions()) {
                assert_eq!(ta.timestamp(), tb.timestamp());
                assert_eq!(ta.hash(), tb.hash());
            }
        }
        assert!(loaded.validate().is_ok());
        assert_eq!(loaded.balance(&w2), 50.0);
    }

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path());

        assert!(!storage.exists());
        let loaded = storage.load().unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.last_index(), 0);
    }

    #[test]
    fn test_empty_ledger_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path());

        storage.save(&Blockchain::new()).unwrap();
        assert_eq!(fs::read(storage.path()).unwrap(), vec![0u8; 8]);
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_file_is_format_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path());

        let mut wallet = Wallet::new();
        wallet.generate_key();
        let mut chain = Blockchain::new();
        chain.mine(&wallet.keys()[0].public_key).unwrap();
        chain.mine(&wallet.keys()[0].public_key).unwrap();
        storage.save(&chain).unwrap();

        let data = fs::read(storage.path()).unwrap();
        fs::write(storage.path(), &data[..data.len() - 5]).unwrap();
        assert!(matches!(storage.load(), Err(StorageError::Format(_))));

        fs::write(storage.path(), &data[..4]).unwrap();
        assert!(matches!(storage.load(), Err(StorageError::Format(_))));

        // Header of a two-block ledger with every block cut off
        fs::write(storage.path(), &data[..8]).unwrap();
        assert!(matches!(
            storage.load(),
            Err(StorageError::Format(CodecError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_header_only_image() {
        assert!(decode_ledger(&0u64.to_le_bytes()).unwrap().is_empty());
        assert!(matches!(
            decode_ledger(&3u64.to_le_bytes()),
            Err(StorageError::Format(CodecError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_save_replaces_previous_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(temp_dir.path());
        let mut wallet = Wallet::new();
        wallet.generate_key();

        let mut chain = Blockchain::new();
        for _ in 0..3 {
            chain.mine(&wallet.keys()[0].public_key).unwrap();
        }
        storage.save(&chain).unwrap();

        let mut shorter = Blockchain::new();
        shorter.mine(&wallet.keys()[0].public_key).unwrap();
        storage.save(&shorter).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.blocks().len(), 1);
        assert!(!temp_dir.path().join("chain.dat.tmp").exists());

        storage.delete().unwrap();
        assert!(!storage.exists());
    }
}
