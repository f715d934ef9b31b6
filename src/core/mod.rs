//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Scripts and the stack VM that executes them
//! - Transactions (inputs reference earlier transactions by hash)
//! - Blocks (hash-linked, coinbase first)
//! - Blockchain (mining, pending queue, validation)
//! - Fund scanning and transfer construction

pub mod block;
pub mod blockchain;
pub mod funds;
pub mod script;
pub mod transaction;
pub mod vm;

pub use block::Block;
pub use blockchain::{Blockchain, BlockchainError, BLOCK_REWARD};
pub use funds::{try_output, Fund, FundsError, TransferOrder};
pub use script::{Instruction, Script, ScriptError};
pub use transaction::{Transaction, TxInput, TxOutput};
pub use vm::{execute, Vm, VmError};
