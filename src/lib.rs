//! stupidcoin: a single-node toy cryptocurrency ledger
//!
//! This crate provides:
//! - Hash-linked blocks of value-transfer transactions
//! - A small stack-based script VM locking and unlocking outputs
//! - ECDSA signatures (secp256k1) and base58 addresses
//! - Fund scanning and transfer construction for a multi-key wallet
//! - A compact binary ledger file
//! - Background mining and transfer workers behind an HTTP API
//!
//! # Example
//!
//! ```rust
//! use stupidcoin::core::{Blockchain, TransferOrder};
//! use stupidcoin::wallet::Wallet;
//!
//! let mut alice = Wallet::new();
//! alice.generate_key();
//! let mut bob = Wallet::new();
//! bob.generate_key();
//!
//! // Mine a block paying alice
//! let mut chain = Blockchain::new();
//! chain.mine(&alice.keys()[0].public_key).unwrap();
//!
//! // Pay bob and mine the transfer
//! let order = TransferOrder { addr: bob.keys()[0].address(), amount: 40.0 };
//! let txn = chain.build_transfer(&alice, &order).unwrap();
//! chain.queue_transaction(txn);
//! chain.mine(&alice.keys()[0].public_key).unwrap();
//!
//! assert_eq!(chain.balance(&bob), 40.0);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::Config;
pub use core::{Block, Blockchain, Script, Transaction, TransferOrder, BLOCK_REWARD};
pub use crypto::KeyPair;
pub use storage::Storage;
pub use wallet::Wallet;
