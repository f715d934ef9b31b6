//! Background ledger workers
//!
//! Two single-consumer tasks own every mutation of the shared ledger:
//! - the mining worker mines one block per request, then saves the ledger;
//! - the order worker turns transfer orders into queued transactions.
//!
//! Both sit behind bounded channels. The mining channel holds a single
//! request, so a second request while one is waiting is refused. Orders that
//! do not fit in the order channel are dropped.

use crate::core::{Blockchain, TransferOrder};
use crate::storage::Storage;
use crate::wallet::Wallet;
use log::{error, info, warn};
use secp256k1::PublicKey;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Worker submission errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("A mining request is already pending")]
    MinePending,
    #[error("Worker stopped")]
    Stopped,
}

/// Handles for submitting work to the ledger workers
#[derive(Clone)]
pub struct LedgerWorkers {
    mine_tx: mpsc::Sender<()>,
    order_tx: mpsc::Sender<TransferOrder>,
}

/// Join handles of the spawned workers
pub struct WorkerHandles {
    mining: JoinHandle<()>,
    orders: JoinHandle<()>,
}

impl WorkerHandles {
    /// Wait for both workers to drain their queues and exit
    ///
    /// Workers exit once every [`LedgerWorkers`] clone has been dropped.
    pub async fn join(self) {
        if let Err(e) = self.mining.await {
            error!("Mining worker panicked: {}", e);
        }
        if let Err(e) = self.orders.await {
            error!("Order worker panicked: {}", e);
        }
    }
}

impl LedgerWorkers {
    /// Spawn both workers on the current tokio runtime
    pub fn spawn(
        blockchain: Arc<RwLock<Blockchain>>,
        wallet: Arc<Wallet>,
        miner: PublicKey,
        storage: Arc<Storage>,
        order_capacity: usize,
    ) -> (Self, WorkerHandles) {
        let (mine_tx, mut mine_rx) = mpsc::channel::<()>(1);
        let (order_tx, mut order_rx) = mpsc::channel::<TransferOrder>(order_capacity.max(1));

        let mining_chain = blockchain.clone();
        let mining = tokio::spawn(async move {
            while mine_rx.recv().await.is_some() {
                let mut chain = mining_chain.write().await;
                if let Err(e) = chain.mine(&miner) {
                    error!("Mining failed: {}", e);
                    continue;
                }
                if let Err(e) = storage.save(&chain) {
                    error!("Failed to save blockchain: {}", e);
                }
            }
            info!("Mining worker stopped");
        });

        let orders = tokio::spawn(async move {
            while let Some(order) = order_rx.recv().await {
                let mut chain = blockchain.write().await;
                match chain.build_transfer(&wallet, &order) {
                    Ok(txn) => {
                        info!(
                            "Queued transfer of {} to {} ({})",
                            order.amount,
                            order.addr,
                            hex::encode(txn.hash())
                        );
                        chain.queue_transaction(txn);
                    }
                    Err(e) => warn!(
                        "Rejected transfer of {} to {}: {}",
                        order.amount, order.addr, e
                    ),
                }
            }
            info!("Order worker stopped");
        });

        (Self { mine_tx, order_tx }, WorkerHandles { mining, orders })
    }

    /// Ask for a block to be mined
    pub fn request_mine(&self) -> Result<(), WorkerError> {
        self.mine_tx.try_send(()).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::MinePending,
            TrySendError::Closed(_) => WorkerError::Stopped,
        })
    }

    /// Submit a transfer order; returns `false` when the queue was full
    pub fn submit_order(&self, order: TransferOrder) -> Result<bool, WorkerError> {
        match self.order_tx.try_send(order) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(order)) => {
                warn!(
                    "Order queue full, dropping transfer of {} to {}",
                    order.amount, order.addr
                );
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(WorkerError::Stopped),
        }
    }
}
