//! Transaction handling for the ledger
//!
//! A transaction spends earlier outputs through its inputs and creates new
//! outputs locked by scripts. Its hash is a pure function of the timestamp,
//! inputs and outputs, and is refreshed by every mutator.

use crate::core::script::Script;
use crate::storage::codec::{self, CodecError};
use bytes::{Buf, BytesMut};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fmt;

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to a previous transaction)
#[derive(Debug, Clone, PartialEq)]
pub struct TxInput {
    /// Hash of the transaction whose output is spent
    pub txhash: Vec<u8>,
    /// Unlocking script
    pub script: Script,
}

impl TxInput {
    pub fn new(txhash: Vec<u8>, script: Script) -> Self {
        Self { txhash, script }
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutput {
    /// Locking script
    pub script: Script,
    /// Amount of coins
    pub amount: f64,
}

impl TxOutput {
    pub fn new(script: Script, amount: f64) -> Self {
        Self { script, amount }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A value-transfer record
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    hash: Vec<u8>,
    timestamp: u64,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create an empty transaction stamped with the current time
    pub fn new() -> Self {
        Self::with_timestamp(Utc::now().timestamp().max(0) as u64)
    }

    /// Create an empty transaction with an explicit timestamp
    pub fn with_timestamp(timestamp: u64) -> Self {
        let mut tx = Self {
            hash: Vec::new(),
            timestamp,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        tx.compute_hash(true);
        tx
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    /// Money creation: a transaction without inputs
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn total_output(&self) -> f64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    pub fn add_input(&mut self, input: TxInput) {
        self.inputs.push(input);
        self.compute_hash(true);
    }

    pub fn add_output(&mut self, output: TxOutput) {
        self.outputs.push(output);
        self.compute_hash(true);
    }

    /// Hash the current content; store it when `persist` is set
    ///
    /// Integers are hashed as their base-10 ASCII rendering, amounts through
    /// their raw IEEE-754 bits.
    pub fn compute_hash(&mut self, persist: bool) -> Vec<u8> {
        let hash = self.content_hash();
        if persist {
            self.hash = hash.clone();
        }
        hash
    }

    fn content_hash(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.to_string().as_bytes());

        for input in &self.inputs {
            hasher.update(&input.txhash);
            hasher.update(input.script.as_bytes());
        }

        for output in &self.outputs {
            hasher.update(output.script.as_bytes());
            hasher.update(output.amount.to_bits().to_string().as_bytes());
        }

        hasher.finalize().to_vec()
    }

    /// Check that the stored hash matches the content
    pub fn verify_hash(&self) -> bool {
        self.hash == self.content_hash()
    }

    // =========================================================================
    // Binary encoding
    // =========================================================================

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        codec::put_bytes(buf, &self.hash)?;
        codec::put_u64(buf, self.timestamp);

        codec::put_count(buf, self.inputs.len())?;
        for input in &self.inputs {
            codec::put_bytes(buf, &input.txhash)?;
            codec::put_bytes(buf, input.script.as_bytes())?;
        }

        codec::put_count(buf, self.outputs.len())?;
        for output in &self.outputs {
            codec::put_bytes(buf, output.script.as_bytes())?;
            codec::put_f64(buf, output.amount);
        }

        Ok(())
    }

    /// Rebuild a transaction through the mutators, then restore the stored hash
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, CodecError> {
        let hash = codec::get_bytes(buf)?;
        let timestamp = codec::get_u64(buf)?;
        let mut tx = Self::with_timestamp(timestamp);

        let input_count = codec::get_u32(buf)?;
        for _ in 0..input_count {
            let txhash = codec::get_bytes(buf)?;
            let script = Script::from_bytes(codec::get_bytes(buf)?);
            tx.add_input(TxInput::new(txhash, script));
        }

        let output_count = codec::get_u32(buf)?;
        for _ in 0..output_count {
            let script = Script::from_bytes(codec::get_bytes(buf)?);
            let amount = codec::get_f64(buf)?;
            tx.add_output(TxOutput::new(script, amount));
        }

        tx.hash = hash;
        Ok(tx)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Txn: {}", hex::encode(&self.hash))?;
        for input in &self.inputs {
            writeln!(
                f,
                "- Input: {} {}",
                hex::encode(&input.txhash),
                input.script
            )?;
        }
        for output in &self.outputs {
            writeln!(f, "- Output: {:.6} - {}", output.amount, output.script)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        let mut tx = Transaction::with_timestamp(1_700_000_000);
        tx.add_input(TxInput::new(vec![0xAA; 32], Script::from_bytes(vec![0x00])));
        tx.add_output(TxOutput::new(Script::from_bytes(vec![0x14, 0x50]), 150.55));
        tx
    }

    #[test]
    fn test_hash_is_deterministic() {
        let mut tx = sample();
        let first = tx.compute_hash(false);
        let second = tx.compute_hash(false);
        assert_eq!(first, second);
        assert_eq!(first, tx.hash());
        assert!(tx.verify_hash());
    }

    #[test]
    fn test_mutation_changes_hash() {
        let mut tx = sample();
        let before = tx.hash().to_vec();

        tx.add_output(TxOutput::new(Script::new(), 1.0));
        let after_output = tx.hash().to_vec();
        assert_ne!(before, after_output);

        tx.add_input(TxInput::new(vec![0xBB; 32], Script::new()));
        assert_ne!(after_output, tx.hash());
    }

    #[test]
    fn test_hash_layout() {
        let tx = sample();

        let mut hasher = Sha256::new();
        hasher.update(b"1700000000");
        hasher.update([0xAA; 32]);
        hasher.update([0x00]);
        hasher.update([0x14, 0x50]);
        hasher.update(150.55f64.to_bits().to_string().as_bytes());

        assert_eq!(tx.hash(), hasher.finalize().as_slice());
    }

    #[test]
    fn test_compute_without_persist_leaves_hash() {
        let mut tx = sample();
        let stored = tx.hash().to_vec();
        tx.outputs[0].amount = 1.0;

        let fresh = tx.compute_hash(false);
        assert_ne!(fresh, stored);
        assert_eq!(tx.hash(), stored.as_slice());
        assert!(!tx.verify_hash());
    }

    #[test]
    fn test_coinbase() {
        let mut tx = Transaction::new();
        tx.add_output(TxOutput::new(Script::new(), 100.0));
        assert!(tx.is_coinbase());
        assert_eq!(tx.total_output(), 100.0);
        assert!(!sample().is_coinbase());
    }

    #[test]
    fn test_encode_decode() {
        let tx = sample();
        let mut buf = BytesMut::new();
        tx.encode(&mut buf).unwrap();

        let mut reader = &buf[..];
        let decoded = Transaction::decode(&mut reader).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.verify_hash());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_decode_keeps_stored_hash() {
        let tx = sample();
        let mut buf = BytesMut::new();
        tx.encode(&mut buf).unwrap();

        // Flip the last amount byte: the stored hash no longer matches
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        let decoded = Transaction::decode(&mut &buf[..]).unwrap();
        assert_eq!(decoded.hash(), tx.hash());
        assert!(!decoded.verify_hash());
    }

    #[test]
    fn test_decode_truncated() {
        let mut buf = BytesMut::new();
        sample().encode(&mut buf).unwrap();
        let cut = &buf[..buf.len() - 3];
        assert!(matches!(
            Transaction::decode(&mut &cut[..]),
            Err(CodecError::Truncated { .. })
        ));
    }
}
