//! CLI commands for the node
//!
//! Implements all command handlers for the CLI interface.

use crate::config::Config;
use crate::core::Blockchain;
use crate::storage::Storage;
use crate::wallet::Wallet;
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub config: Config,
    pub blockchain: Blockchain,
    pub storage: Storage,
    pub wallet: Wallet,
}

impl AppState {
    /// Load configuration, ledger and wallet
    pub fn new(config_file: &Path) -> CliResult<Self> {
        let config = Config::load(config_file)?;
        let storage = Storage::new(config.storage());
        let blockchain = storage.load()?;
        let wallet = Wallet::load(&config.wallet)?;

        Ok(Self {
            config,
            blockchain,
            storage,
            wallet,
        })
    }

    /// Save the ledger
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.blockchain)?;
        Ok(())
    }
}

/// Add a fresh key to the wallet
pub fn cmd_create_key(state: &mut AppState) -> CliResult<()> {
    let address = state.wallet.generate_key().address();
    state.wallet.save(&state.config.wallet)?;

    println!("🔐 New key created!");
    println!("   📍 Address: {}", address);
    println!("   💾 Wallet: {}", state.config.wallet.display());

    Ok(())
}

/// List wallet keys
pub fn cmd_list_keys(state: &AppState) -> CliResult<()> {
    let keys = state.wallet.export_public_info();

    if keys.is_empty() {
        println!("📭 No keys found. Create one with: stupidcoin create-key");
        return Ok(());
    }

    println!("📋 Keys:");
    for (i, info) in keys.iter().enumerate() {
        let marker = if i == 0 { " (change)" } else { "" };
        println!("   {}{}", info.address, marker);
    }

    Ok(())
}

/// Mine blocks for the configured mining address
pub fn cmd_mine(state: &mut AppState, count: u32) -> CliResult<()> {
    let key = state
        .wallet
        .public_key_by_address(&state.config.mining_addr)?;

    for _ in 0..count {
        let block = state.blockchain.mine(&key)?;
        println!("⛏️  Block {} mined!", block.index);
        println!("   ├─ Hash: {}", hex::encode(block.hash()));
        println!("   └─ Transactions: {}", block.tx_count());
    }

    state.save()?;
    println!("\n{}", state.blockchain.dump());

    Ok(())
}

/// Print the whole ledger
pub fn cmd_dump(state: &AppState) -> CliResult<()> {
    println!("{}", state.blockchain.dump());
    Ok(())
}

/// Show spendable funds of the wallet
pub fn cmd_funds(state: &AppState) -> CliResult<()> {
    let funds = state.blockchain.scan_funds(&state.wallet);

    println!("💰 Funds");
    for fund in &funds {
        println!(
            "   └─ {}:{} = {:.6} coins",
            hex::encode(fund.txn.hash()),
            fund.output_index,
            fund.amount()
        );
    }
    let total: f64 = funds.iter().map(|f| f.amount()).sum();
    println!("   Total: {:.6} coins in {} output(s)", total, funds.len());

    Ok(())
}

/// Validate the ledger
pub fn cmd_validate(state: &AppState) -> CliResult<()> {
    println!("🔍 Validating blockchain...");

    match state.blockchain.validate() {
        Ok(()) => {
            println!("✅ Blockchain is valid!");
            println!("   {} blocks verified", state.blockchain.blocks().len());
        }
        Err(e) => {
            println!("❌ Blockchain validation FAILED!");
            println!("   {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_in(dir: &Path) -> AppState {
        let config = Config {
            blockchain: dir.join("chain.dat"),
            wallet: dir.join("wallet.json"),
            ..Default::default()
        };
        let config_file = dir.join("config.json");
        config.save(&config_file).unwrap();
        AppState::new(&config_file).unwrap()
    }

    #[test]
    fn test_create_key_then_mine() {
        let dir = tempfile::tempdir().unwrap();

        let mut state = state_in(dir.path());
        assert!(state.blockchain.is_empty());
        cmd_create_key(&mut state).unwrap();
        cmd_mine(&mut state, 2).unwrap();

        // A fresh load sees the saved key and ledger
        let state = state_in(dir.path());
        assert_eq!(state.wallet.keys().len(), 1);
        assert_eq!(state.blockchain.blocks().len(), 2);
        assert_eq!(state.blockchain.balance(&state.wallet), 200.0);
        cmd_funds(&state).unwrap();
        cmd_dump(&state).unwrap();
        cmd_validate(&state).unwrap();
    }

    #[test]
    fn test_mine_without_keys_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_in(dir.path());
        assert!(cmd_mine(&mut state, 1).is_err());
        assert!(!state.storage.exists());
    }
}
