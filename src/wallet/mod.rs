//! Wallet module for key management

pub mod wallet;

pub use wallet::{Wallet, WalletError, WalletInfo};
