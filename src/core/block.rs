//! Block implementation for the ledger
//!
//! A block is an ordered list of transactions chained to its predecessor by
//! hash. The block hash covers the index, the previous hash, the timestamp
//! and every transaction hash, and is refreshed on each `add_transaction`.

use crate::core::transaction::Transaction;
use crate::storage::codec::{self, CodecError};
use bytes::{Buf, BytesMut};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fmt;

/// A block in the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Block index/height
    pub index: u64,
    /// Hash of the previous block (empty for genesis)
    pub last_hash: Vec<u8>,
    /// Creation time (unix seconds)
    pub timestamp: u64,
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
}

impl Block {
    /// Create an empty block stamped with the current time
    pub fn new(index: u64, last_hash: Vec<u8>) -> Self {
        Self::with_timestamp(index, last_hash, Utc::now().timestamp().max(0) as u64)
    }

    pub fn with_timestamp(index: u64, last_hash: Vec<u8>, timestamp: u64) -> Self {
        let mut block = Self {
            index,
            last_hash,
            timestamp,
            hash: Vec::new(),
            transactions: Vec::new(),
        };
        block.compute_hash(true);
        block
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Get the coinbase transaction (first transaction)
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
        self.compute_hash(true);
    }

    /// Hash the current content; store it when `persist` is set
    pub fn compute_hash(&mut self, persist: bool) -> Vec<u8> {
        let hash = self.content_hash();
        if persist {
            self.hash = hash.clone();
        }
        hash
    }

    fn content_hash(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        hasher.update(&self.last_hash);
        hasher.update(self.timestamp.to_string().as_bytes());
        for tx in &self.transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().to_vec()
    }

    /// Verify the stored block hash (transaction scripts are not executed)
    pub fn verify(&self) -> bool {
        self.hash == self.content_hash()
    }

    // =========================================================================
    // Binary encoding
    // =========================================================================

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        codec::put_u64(buf, self.index);
        codec::put_bytes(buf, &self.last_hash)?;
        codec::put_u64(buf, self.timestamp);
        codec::put_bytes(buf, &self.hash)?;

        codec::put_count(buf, self.transactions.len())?;
        for tx in &self.transactions {
            tx.encode(buf)?;
        }

        Ok(())
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let index = codec::get_u64(buf)?;
        let last_hash = codec::get_bytes(buf)?;
        let timestamp = codec::get_u64(buf)?;
        let hash = codec::get_bytes(buf)?;

        let mut block = Self::with_timestamp(index, last_hash, timestamp);
        let tx_count = codec::get_u32(buf)?;
        for _ in 0..tx_count {
            block.add_transaction(Transaction::decode(buf)?);
        }

        block.hash = hash;
        Ok(block)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index: {}", self.index)?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        writeln!(f, "Last hash: {}", hex::encode(&self.last_hash))?;
        writeln!(f, "Hash: {}", hex::encode(&self.hash))?;
        for tx in &self.transactions {
            write!(f, "{}", tx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::Script;
    use crate::core::transaction::TxOutput;

    fn coinbase(amount: f64) -> Transaction {
        let mut tx = Transaction::with_timestamp(42);
        tx.add_output(TxOutput::new(Script::from_bytes(vec![0x50]), amount));
        tx
    }

    #[test]
    fn test_new_block_hash_covers_empty_state() {
        let mut block = Block::with_timestamp(0, Vec::new(), 1000);
        assert!(block.verify());
        assert_eq!(block.compute_hash(false), block.hash());
        assert!(block.coinbase().is_none());
    }

    #[test]
    fn test_add_transaction_changes_hash() {
        let mut block = Block::new(1, vec![0x01; 32]);
        let before = block.hash().to_vec();

        block.add_transaction(coinbase(100.0));
        assert_ne!(before, block.hash());
        assert!(block.verify());
        assert_eq!(block.tx_count(), 1);
        assert!(block.coinbase().is_some());
    }

    #[test]
    fn test_hash_layout() {
        let mut block = Block::with_timestamp(3, vec![0xCC; 4], 77);
        let tx = coinbase(1.0);
        block.add_transaction(tx.clone());

        let mut hasher = Sha256::new();
        hasher.update(b"3");
        hasher.update([0xCC; 4]);
        hasher.update(b"77");
        hasher.update(tx.hash());
        assert_eq!(block.hash(), hasher.finalize().as_slice());
    }

    #[test]
    fn test_tampered_block_fails_verification() {
        let mut block = Block::new(1, vec![0x01; 32]);
        block.add_transaction(coinbase(100.0));
        block.index = 5;
        assert!(!block.verify());
    }

    #[test]
    fn test_encode_decode() {
        let mut block = Block::new(2, vec![0x02; 32]);
        block.add_transaction(coinbase(100.0));
        block.add_transaction(coinbase(0.5));

        let mut buf = BytesMut::new();
        block.encode(&mut buf).unwrap();

        let mut reader = &buf[..];
        let decoded = Block::decode(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded, block);
        assert!(decoded.verify());
    }

    #[test]
    fn test_decode_truncated() {
        let mut buf = BytesMut::new();
        Block::new(0, Vec::new()).encode(&mut buf).unwrap();
        let cut = &buf[..buf.len() - 1];
        assert!(Block::decode(&mut &cut[..]).is_err());
    }
}
