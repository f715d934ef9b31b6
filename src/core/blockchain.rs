//! Blockchain implementation
//!
//! The ledger: an ordered list of hash-linked blocks plus an in-memory queue
//! of transactions waiting for the next mined block. The queue is never
//! persisted.

use crate::core::block::Block;
use crate::core::script::{Script, ScriptError};
use crate::core::transaction::{Transaction, TxOutput};
use crate::core::vm;
use crate::crypto::public_key_to_bytes;
use chrono::Utc;
use log::{debug, info};
use secp256k1::PublicKey;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;

/// Coins granted by the coinbase transaction of every mined block
pub const BLOCK_REWARD: f64 = 100.0;

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Invalid block {0}: {1}")]
    InvalidBlock(u64, String),
    #[error("Invalid transaction {0}: {1}")]
    InvalidTransaction(String, String),
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
}

/// The ledger
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    last_index: u64,
    blocks: Vec<Block>,
    pending: VecDeque<Transaction>,
}

impl Blockchain {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a ledger from decoded blocks
    pub(crate) fn from_blocks(last_index: u64, blocks: Vec<Block>) -> Self {
        Self {
            last_index,
            blocks,
            pending: VecDeque::new(),
        }
    }

    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of blocks in the chain
    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    /// Get the latest block
    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Get a block by index
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(usize::try_from(index).ok()?)
    }

    /// Find a transaction anywhere in the chain by hash
    pub fn find_transaction(&self, hash: &[u8]) -> Option<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions())
            .find(|tx| tx.hash() == hash)
    }

    /// Transactions waiting for the next block, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Transaction> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue a transaction for the next mined block (no validation)
    pub fn queue_transaction(&mut self, tx: Transaction) {
        debug!("Queued transaction {}", hex::encode(tx.hash()));
        self.pending.push_back(tx);
    }

    /// Append the next block
    ///
    /// The block opens with a coinbase paying [`BLOCK_REWARD`] to `key`
    /// (pay-to-key), followed by every pending transaction in queue order.
    pub fn mine(&mut self, key: &PublicKey) -> Result<&Block, BlockchainError> {
        let mut block = match self.blocks.last() {
            None => Block::new(0, Vec::new()),
            Some(tip) => Block::new(tip.index + 1, tip.hash().to_vec()),
        };

        // Coinbase timestamps strictly increase so equal rewards never share a hash
        let now = Utc::now().timestamp().max(0) as u64;
        let stamp = match self.blocks.last().and_then(Block::coinbase) {
            Some(previous) => now.max(previous.timestamp() + 1),
            None => now,
        };
        let mut coinbase = Transaction::with_timestamp(stamp);
        let lock = Script::pay_to_key(&public_key_to_bytes(key))?;
        coinbase.add_output(TxOutput::new(lock, BLOCK_REWARD));
        block.add_transaction(coinbase);

        for tx in self.pending.drain(..) {
            block.add_transaction(tx);
        }

        info!(
            "Mined block {} with {} transaction(s): {}",
            block.index,
            block.tx_count(),
            hex::encode(block.hash())
        );

        self.last_index = block.index;
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Validate the whole chain
    ///
    /// Checks indices, hash links, stored block and transaction hashes,
    /// coinbase placement, and that every input unlocks at least one output
    /// of the earlier transaction it references.
    pub fn validate(&self) -> Result<(), BlockchainError> {
        let mut seen: HashMap<&[u8], &Transaction> = HashMap::new();

        for (position, block) in self.blocks.iter().enumerate() {
            if block.index != position as u64 {
                return Err(BlockchainError::InvalidBlock(
                    block.index,
                    format!("expected index {}", position),
                ));
            }

            let expected_link: &[u8] = match position {
                0 => &[],
                _ => self.blocks[position - 1].hash(),
            };
            if block.last_hash != expected_link {
                return Err(BlockchainError::InvalidBlock(
                    block.index,
                    "previous hash does not match".to_string(),
                ));
            }

            if !block.verify() {
                return Err(BlockchainError::InvalidBlock(
                    block.index,
                    "invalid block hash".to_string(),
                ));
            }

            if block.coinbase().is_none() {
                return Err(BlockchainError::InvalidBlock(
                    block.index,
                    "missing coinbase transaction".to_string(),
                ));
            }

            for (slot, tx) in block.transactions().iter().enumerate() {
                let id = hex::encode(tx.hash());
                if !tx.verify_hash() {
                    return Err(BlockchainError::InvalidTransaction(
                        id,
                        "invalid transaction hash".to_string(),
                    ));
                }
                if slot > 0 && tx.is_coinbase() {
                    return Err(BlockchainError::InvalidTransaction(
                        id,
                        "coinbase outside first position".to_string(),
                    ));
                }

                for input in tx.inputs() {
                    let source = seen.get(input.txhash.as_slice()).ok_or_else(|| {
                        BlockchainError::InvalidTransaction(
                            id.clone(),
                            format!("unknown input {}", hex::encode(&input.txhash)),
                        )
                    })?;

                    let unlocked = source
                        .outputs()
                        .iter()
                        .any(|output| vm::execute(&input.script, &output.script).is_ok());
                    if !unlocked {
                        return Err(BlockchainError::InvalidTransaction(
                            id,
                            format!("input {} unlocks no output", hex::encode(&input.txhash)),
                        ));
                    }
                }

                seen.insert(tx.hash(), tx);
            }
        }

        match self.blocks.last() {
            Some(tip) if tip.index != self.last_index => Err(BlockchainError::InvalidChain(
                format!("last index {} but tip is {}", self.last_index, tip.index),
            )),
            _ => Ok(()),
        }
    }

    /// Human-readable rendering of the whole chain
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(f, "### Block {} ###", i)?;
            writeln!(f, "{}", block)?;
        }
        write!(f, "{} block(s).", self.blocks.len())
    }
}
