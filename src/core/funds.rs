//! Spendable output resolution and transfer construction
//!
//! Funds are found by a single backward pass over the chain: each input seen
//! marks its source transaction as spent, and a transaction whose hash is
//! already marked is skipped. Outputs are consumed per transaction, so a
//! transfer re-issues the unspent siblings of every source it touches.

use crate::core::blockchain::Blockchain;
use crate::core::script::{Script, ScriptError};
use crate::core::transaction::{Transaction, TxInput, TxOutput};
use crate::core::vm;
use crate::crypto::{is_valid_address, KeyPair};
use crate::wallet::Wallet;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Transfer construction errors
#[derive(Error, Debug)]
pub enum FundsError {
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: f64, requested: f64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("Invalid destination address")]
    InvalidAddress,
    #[error("Wallet has no keys")]
    EmptyWallet,
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
}

/// A spendable output together with the script that unlocks it
#[derive(Debug, Clone)]
pub struct Fund<'a> {
    pub txn: &'a Transaction,
    pub output_index: usize,
    pub unlock: Script,
}

impl Fund<'_> {
    pub fn amount(&self) -> f64 {
        self.txn.outputs()[self.output_index].amount
    }
}

/// A request to pay `amount` to the owner of `addr`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub addr: String,
    pub amount: f64,
}

/// Find an unlocking script for `lock` among the given keys
///
/// Each key first tries a pay-to-key unlock, then a pay-to-key-hash unlock.
/// The first script the VM accepts wins.
pub fn try_output(keys: &[KeyPair], lock: &Script) -> Option<Script> {
    for key in keys {
        let Ok(signature) = key.sign(lock.as_bytes()) else {
            continue;
        };

        let candidates = [
            Script::unlock_pay_to_key(&signature),
            Script::unlock_pay_to_key_hash(&signature, &key.public_key_bytes()),
        ];
        for unlock in candidates.into_iter().flatten() {
            if vm::execute(&unlock, lock).is_ok() {
                return Some(unlock);
            }
        }
    }
    None
}

impl Blockchain {
    /// Every output the wallet can spend, newest block first
    pub fn scan_funds(&self, wallet: &Wallet) -> Vec<Fund<'_>> {
        let mut spent: HashSet<&[u8]> = HashSet::new();
        let mut funds = Vec::new();

        for block in self.blocks().iter().rev() {
            for txn in block.transactions() {
                for input in txn.inputs() {
                    spent.insert(&input.txhash);
                }
                if spent.contains(txn.hash()) {
                    continue;
                }

                for (output_index, output) in txn.outputs().iter().enumerate() {
                    if let Some(unlock) = try_output(wallet.keys(), &output.script) {
                        funds.push(Fund {
                            txn,
                            output_index,
                            unlock,
                        });
                    }
                }
            }
        }

        funds
    }

    /// Total value of the wallet's spendable outputs
    pub fn balance(&self, wallet: &Wallet) -> f64 {
        self.scan_funds(wallet).iter().map(Fund::amount).sum()
    }

    /// Assemble a transaction paying `order` from the wallet's funds
    ///
    /// Funds are consumed greedily in scan order. Surplus goes back to the
    /// wallet's first key as change, and each consumed source transaction has
    /// its remaining outputs copied forward exactly once.
    pub fn build_transfer(
        &self,
        wallet: &Wallet,
        order: &TransferOrder,
    ) -> Result<Transaction, FundsError> {
        if !order.amount.is_finite() || order.amount <= 0.0 {
            return Err(FundsError::InvalidAmount(order.amount));
        }
        if !is_valid_address(&order.addr) {
            return Err(FundsError::InvalidAddress);
        }
        let owner = wallet.keys().first().ok_or(FundsError::EmptyWallet)?;

        let mut selected = Vec::new();
        let mut total = 0.0;
        for fund in self.scan_funds(wallet) {
            if total >= order.amount {
                break;
            }
            total += fund.amount();
            selected.push(fund);
        }

        if total < order.amount {
            return Err(FundsError::InsufficientFunds {
                available: total,
                requested: order.amount,
            });
        }

        let mut txn = Transaction::new();
        for fund in &selected {
            txn.add_input(TxInput::new(fund.txn.hash().to_vec(), fund.unlock.clone()));
        }

        let destination = Script::pay_to_key_hash(order.addr.as_bytes())?;
        txn.add_output(TxOutput::new(destination, order.amount));

        if total > order.amount {
            let change = Script::pay_to_key_hash(owner.address().as_bytes())?;
            txn.add_output(TxOutput::new(change, total - order.amount));
        }

        // Source transactions in first-consumed order, with the outputs taken
        let mut sources: Vec<(&Transaction, HashSet<usize>)> = Vec::new();
        let mut position: HashMap<&[u8], usize> = HashMap::new();
        for fund in &selected {
            let slot = *position.entry(fund.txn.hash()).or_insert_with(|| {
                sources.push((fund.txn, HashSet::new()));
                sources.len() - 1
            });
            sources[slot].1.insert(fund.output_index);
        }

        for (source, consumed) in sources {
            for (index, output) in source.outputs().iter().enumerate() {
                if !consumed.contains(&index) {
                    txn.add_output(output.clone());
                }
            }
        }

        debug!(
            "Built transfer {} of {} to {} from {} fund(s)",
            hex::encode(txn.hash()),
            order.amount,
            order.addr,
            selected.len()
        );
        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 0.000001;

    fn single_key_wallet() -> Wallet {
        let mut wallet = Wallet::new();
        wallet.generate_key();
        wallet
    }

    fn miner(wallet: &Wallet) -> secp256k1::PublicKey {
        wallet.keys()[0].public_key
    }

    fn order_to(wallet: &Wallet, amount: f64) -> TransferOrder {
        TransferOrder {
            addr: wallet.keys()[0].address(),
            amount,
        }
    }

    fn assert_balance(chain: &Blockchain, wallet: &Wallet, expected: f64) {
        let balance = chain.balance(wallet);
        assert!(
            (balance - expected).abs() <= TOLERANCE,
            "balance {} != {}",
            balance,
            expected
        );
    }

    fn transfer(chain: &mut Blockchain, from: &Wallet, to: &Wallet, amount: f64) {
        let txn = chain.build_transfer(from, &order_to(to, amount)).unwrap();
        chain.queue_transaction(txn);
    }

    #[test]
    fn test_mined_rewards_are_funds() {
        let mut chain = Blockchain::new();
        let wallet = single_key_wallet();

        chain.mine(&miner(&wallet)).unwrap();
        chain.mine(&miner(&wallet)).unwrap();

        let funds = chain.scan_funds(&wallet);
        assert_eq!(funds.len(), 2);
        assert_eq!(funds[0].txn.hash(), chain.blocks()[1].transactions()[0].hash());
        assert_balance(&chain, &wallet, 200.0);
        assert_balance(&chain, &single_key_wallet(), 0.0);
    }

    #[test]
    fn test_rewards_mined_in_a_burst_stay_distinct() {
        let w1 = single_key_wallet();
        let w2 = single_key_wallet();
        let mut chain = Blockchain::new();

        for _ in 0..3 {
            chain.mine(&miner(&w1)).unwrap();
        }
        let hashes: HashSet<&[u8]> = chain
            .blocks()
            .iter()
            .map(|block| block.coinbase().unwrap().hash())
            .collect();
        assert_eq!(hashes.len(), 3);

        transfer(&mut chain, &w1, &w2, 100.0);
        chain.mine(&miner(&w1)).unwrap();

        assert_balance(&chain, &w1, 300.0);
        assert_balance(&chain, &w2, 100.0);
        let total = chain.balance(&w1) + chain.balance(&w2);
        assert!((total - 100.0 * chain.height() as f64).abs() <= TOLERANCE);
        chain.validate().unwrap();
    }

    #[test]
    fn test_transfer_scenario() {
        let w1 = single_key_wallet();
        let w2 = single_key_wallet();
        let mut chain = Blockchain::new();

        chain.mine(&miner(&w1)).unwrap();
        chain.mine(&miner(&w1)).unwrap();
        assert_balance(&chain, &w1, 200.0);
        assert_balance(&chain, &w2, 0.0);

        transfer(&mut chain, &w1, &w2, 150.55);
        // Queued but not mined
        assert_balance(&chain, &w1, 200.0);
        assert_balance(&chain, &w2, 0.0);

        chain.mine(&miner(&w1)).unwrap();
        assert_balance(&chain, &w1, 300.0 - 150.55);
        assert_balance(&chain, &w2, 150.55);

        transfer(&mut chain, &w2, &w1, 130.0);
        chain.mine(&miner(&w1)).unwrap();
        assert_balance(&chain, &w1, 400.0 - 150.55 + 130.0);
        assert_balance(&chain, &w2, 150.55 - 130.0);

        transfer(&mut chain, &w2, &w1, 20.55);
        chain.mine(&miner(&w1)).unwrap();
        assert_balance(&chain, &w1, 500.0);
        assert_balance(&chain, &w2, 0.0);

        let total = chain.balance(&w1) + chain.balance(&w2);
        assert!((total - 100.0 * chain.blocks().len() as f64).abs() <= TOLERANCE);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_change_goes_to_first_key() {
        let w1 = single_key_wallet();
        let w2 = single_key_wallet();
        let mut chain = Blockchain::new();
        chain.mine(&miner(&w1)).unwrap();

        let txn = chain.build_transfer(&w1, &order_to(&w2, 40.0)).unwrap();
        assert_eq!(txn.inputs().len(), 1);
        assert_eq!(txn.outputs().len(), 2);
        assert_eq!(txn.outputs()[0].amount, 40.0);
        assert_eq!(
            txn.outputs()[0].script,
            Script::pay_to_key_hash(w2.keys()[0].address().as_bytes()).unwrap()
        );
        assert_eq!(txn.outputs()[1].amount, 60.0);
        assert_eq!(
            txn.outputs()[1].script,
            Script::pay_to_key_hash(w1.keys()[0].address().as_bytes()).unwrap()
        );
        assert!(txn.verify_hash());
    }

    #[test]
    fn test_exact_amount_has_no_change() {
        let w1 = single_key_wallet();
        let w2 = single_key_wallet();
        let mut chain = Blockchain::new();
        chain.mine(&miner(&w1)).unwrap();

        let txn = chain.build_transfer(&w1, &order_to(&w2, 100.0)).unwrap();
        assert_eq!(txn.outputs().len(), 1);
    }

    #[test]
    fn test_insufficient_funds_queues_nothing() {
        let w1 = single_key_wallet();
        let w2 = single_key_wallet();
        let mut chain = Blockchain::new();
        chain.mine(&miner(&w1)).unwrap();

        let result = chain.build_transfer(&w1, &order_to(&w2, 100.01));
        assert!(matches!(
            result,
            Err(FundsError::InsufficientFunds { available, requested })
                if available == 100.0 && requested == 100.01
        ));
        assert_eq!(chain.pending_count(), 0);
        assert_balance(&chain, &w1, 100.0);
    }

    #[test]
    fn test_rejects_bad_orders() {
        let w1 = single_key_wallet();
        let mut chain = Blockchain::new();
        chain.mine(&miner(&w1)).unwrap();

        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                chain.build_transfer(&w1, &order_to(&w1, amount)),
                Err(FundsError::InvalidAmount(_))
            ));
        }

        let blank = TransferOrder {
            addr: String::new(),
            amount: 1.0,
        };
        assert!(matches!(
            chain.build_transfer(&w1, &blank),
            Err(FundsError::InvalidAddress)
        ));

        let mut typo = order_to(&w1, 1.0);
        typo.addr.insert(3, 'x');
        assert!(matches!(
            chain.build_transfer(&w1, &typo),
            Err(FundsError::InvalidAddress)
        ));
        assert!(matches!(
            chain.build_transfer(&Wallet::new(), &order_to(&w1, 1.0)),
            Err(FundsError::EmptyWallet)
        ));
    }

    #[test]
    fn test_shared_source_is_copied_forward_once() {
        let w1 = single_key_wallet();
        let w2 = single_key_wallet();
        let w3 = single_key_wallet();
        let mut chain = Blockchain::new();

        // One transaction paying w2 twice and w3 once
        chain.mine(&miner(&w1)).unwrap();
        let mut split = chain.build_transfer(&w1, &order_to(&w2, 30.0)).unwrap();
        split.add_output(TxOutput::new(
            Script::pay_to_key_hash(w2.keys()[0].address().as_bytes()).unwrap(),
            20.0,
        ));
        split.add_output(TxOutput::new(
            Script::pay_to_key_hash(w3.keys()[0].address().as_bytes()).unwrap(),
            5.0,
        ));
        chain.queue_transaction(split.clone());
        chain.mine(&miner(&w1)).unwrap();

        // Spending both w2 outputs consumes the same source twice
        let txn = chain.build_transfer(&w2, &order_to(&w1, 45.0)).unwrap();
        assert_eq!(txn.inputs().len(), 2);
        assert!(txn.inputs().iter().all(|i| i.txhash == split.hash()));

        // Payment, change, then each untouched sibling of the source once
        let amounts: Vec<f64> = txn.outputs().iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![45.0, 5.0, 70.0, 5.0]);

        chain.queue_transaction(txn);
        chain.mine(&miner(&w1)).unwrap();
        assert_balance(&chain, &w2, 5.0);
        assert_balance(&chain, &w3, 5.0);
        // Three rewards plus the 25 added by hand, minus what w2 and w3 hold
        assert_balance(&chain, &w1, 325.0 - 10.0);
    }

    #[test]
    fn test_try_output() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();

        let p2pk = Script::pay_to_key(&kp.public_key_bytes()).unwrap();
        let unlock = try_output(std::slice::from_ref(&kp), &p2pk).unwrap();
        assert_eq!(vm::execute(&unlock, &p2pk), Ok(()));
        assert!(try_output(std::slice::from_ref(&other), &p2pk).is_none());

        let p2pkh = Script::pay_to_key_hash(kp.address().as_bytes()).unwrap();
        let keys = vec![other.clone(), kp.clone()];
        let unlock = try_output(&keys, &p2pkh).unwrap();
        assert_eq!(vm::execute(&unlock, &p2pkh), Ok(()));
        assert!(try_output(&[], &p2pkh).is_none());
    }
}
