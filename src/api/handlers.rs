//! REST API handlers for ledger operations
//!
//! Reads go straight to the shared ledger. Mining and transfers are handed to
//! the [`LedgerWorkers`] and answered with `202 Accepted`.

use crate::api::workers::{LedgerWorkers, WorkerError};
use crate::core::{Block, Blockchain, Transaction, TransferOrder};
use crate::wallet::Wallet;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub wallet: Arc<Wallet>,
    pub workers: LedgerWorkers,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ChainInfo {
    pub height: usize,
    pub last_index: u64,
    pub pending_transactions: usize,
    pub latest_hash: Option<String>,
    pub blocks: Vec<BlockInfo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BlockInfo {
    pub index: u64,
    pub hash: String,
    pub last_hash: String,
    pub timestamp: u64,
    pub transactions: usize,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: hex::encode(block.hash()),
            last_hash: hex::encode(&block.last_hash),
            timestamp: block.timestamp,
            transactions: block.tx_count(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TransactionResponse {
    pub hash: String,
    pub timestamp: u64,
    pub is_coinbase: bool,
    pub inputs: usize,
    pub outputs: usize,
    pub total_output: f64,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            hash: hex::encode(tx.hash()),
            timestamp: tx.timestamp(),
            is_coinbase: tx.is_coinbase(),
            inputs: tx.inputs().len(),
            outputs: tx.outputs().len(),
            total_output: tx.total_output(),
        }
    }
}

#[derive(Serialize)]
pub struct FundInfo {
    pub txhash: String,
    pub output_index: usize,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct FundsResponse {
    pub total: f64,
    pub funds: Vec<FundInfo>,
}

#[derive(Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub blocks_checked: usize,
    pub message: String,
}

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<(StatusCode, Json<T>), (StatusCode, Json<ApiError>)>;

fn worker_error(e: WorkerError) -> (StatusCode, Json<ApiError>) {
    let status = match e {
        WorkerError::MinePending => StatusCode::CONFLICT,
        WorkerError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ApiError { error: e.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/chain - Ledger summary with every block
pub async fn get_chain_info(State(state): State<ApiState>) -> Json<ChainInfo> {
    let chain = state.blockchain.read().await;

    Json(ChainInfo {
        height: chain.height(),
        last_index: chain.last_index(),
        pending_transactions: chain.pending_count(),
        latest_hash: chain.latest_block().map(|b| hex::encode(b.hash())),
        blocks: chain.blocks().iter().map(BlockInfo::from).collect(),
    })
}

/// GET /api/chain/blocks/:height - Get block by height
pub async fn get_block_by_height(
    State(state): State<ApiState>,
    Path(height): Path<u64>,
) -> Result<Json<BlockInfo>, (StatusCode, Json<ApiError>)> {
    let chain = state.blockchain.read().await;

    match chain.get_block(height) {
        Some(block) => Ok(Json(BlockInfo::from(block))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("Block at height {} not found", height),
            }),
        )),
    }
}

/// GET /api/chain/validate - Validate the ledger
pub async fn validate_chain(State(state): State<ApiState>) -> Json<ValidationResponse> {
    let chain = state.blockchain.read().await;
    let block_count = chain.blocks().len();

    let (valid, message) = match chain.validate() {
        Ok(()) => (
            true,
            format!("Blockchain is valid ({} blocks verified)", block_count),
        ),
        Err(e) => (false, e.to_string()),
    };

    Json(ValidationResponse {
        valid,
        blocks_checked: block_count,
        message,
    })
}

/// GET /api/transactions/:hash - Find a mined or pending transaction
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> Result<Json<TransactionResponse>, (StatusCode, Json<ApiError>)> {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("Transaction {} not found", hash),
            }),
        )
    };
    let raw = hex::decode(&hash).map_err(|_| not_found())?;

    let chain = state.blockchain.read().await;
    chain
        .find_transaction(&raw)
        .or_else(|| chain.pending().find(|tx| tx.hash() == raw.as_slice()))
        .map(|tx| Json(TransactionResponse::from(tx)))
        .ok_or_else(not_found)
}

/// GET /api/mempool - Transactions waiting for the next block
pub async fn get_pending(State(state): State<ApiState>) -> Json<Vec<TransactionResponse>> {
    let chain = state.blockchain.read().await;
    Json(chain.pending().map(TransactionResponse::from).collect())
}

/// GET /api/funds - Spendable outputs of the node wallet
pub async fn get_funds(State(state): State<ApiState>) -> Json<FundsResponse> {
    let chain = state.blockchain.read().await;
    let funds: Vec<FundInfo> = chain
        .scan_funds(&state.wallet)
        .iter()
        .map(|fund| FundInfo {
            txhash: hex::encode(fund.txn.hash()),
            output_index: fund.output_index,
            amount: fund.amount(),
        })
        .collect();

    Json(FundsResponse {
        total: funds.iter().map(|f| f.amount).sum(),
        funds,
    })
}

/// POST /api/mine - Request a new block
pub async fn mine_block(State(state): State<ApiState>) -> ApiResult<AcceptedResponse> {
    state.workers.request_mine().map_err(worker_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "mining".to_string(),
        }),
    ))
}

/// POST /api/transactions - Submit a transfer order
pub async fn submit_transaction(
    State(state): State<ApiState>,
    Json(order): Json<TransferOrder>,
) -> ApiResult<OrderResponse> {
    let queued = state.workers.submit_order(order).map_err(worker_error)?;
    Ok((StatusCode::ACCEPTED, Json(OrderResponse { queued })))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
