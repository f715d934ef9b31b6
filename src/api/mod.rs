//! REST API module
//!
//! Provides HTTP access to the node's ledger and wallet.
//!
//! # Endpoints
//!
//! ## Chain
//! - `GET /api/chain` - Ledger summary and block list
//! - `GET /api/chain/blocks/{height}` - Get block by height
//! - `GET /api/chain/validate` - Validate the ledger
//!
//! ## Mining
//! - `POST /api/mine` - Request a block (202, or 409 while one is pending)
//!
//! ## Transactions
//! - `POST /api/transactions` - Submit `{ "addr", "amount" }` (202)
//! - `GET /api/transactions/{hash}` - Get a mined or pending transaction
//! - `GET /api/mempool` - List pending transactions
//!
//! ## Wallet
//! - `GET /api/funds` - Spendable outputs of the node wallet

pub mod handlers;
pub mod routes;
pub mod workers;

pub use handlers::ApiState;
pub use routes::create_router;
pub use workers::{LedgerWorkers, WorkerError, WorkerHandles};
