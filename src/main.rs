//! stupidcoin command line application
//!
//! Manages the node wallet, mines blocks locally and serves the HTTP API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stupidcoin::api::{create_router, ApiState, LedgerWorkers};
use stupidcoin::cli::{self, AppState};
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "stupidcoin")]
#[command(version = "0.1.0")]
#[command(about = "A single-node toy cryptocurrency ledger", long_about = None)]
struct Cli {
    /// Configuration file to use
    #[arg(long, default_value = "config.json")]
    config_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a key pair and add it to the wallet
    CreateKey,

    /// List keys in the wallet
    ListKeys,

    /// Mine blocks for the configured mining address
    Mine {
        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Dump the whole chain
    Dump,

    /// Show spendable funds of the wallet
    Funds,

    /// Validate the chain
    Validate,

    /// Start the HTTP API server
    Serve {
        /// Listen address (overrides the configuration)
        #[arg(short, long)]
        listen: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut state = AppState::new(&cli.config_file)?;

    match cli.command {
        Commands::CreateKey => cli::cmd_create_key(&mut state)?,
        Commands::ListKeys => cli::cmd_list_keys(&state)?,
        Commands::Mine { count } => cli::cmd_mine(&mut state, count)?,
        Commands::Dump => cli::cmd_dump(&state)?,
        Commands::Funds => cli::cmd_funds(&state)?,
        Commands::Validate => cli::cmd_validate(&state)?,
        Commands::Serve { listen } => run_server(state, listen)?,
    }

    Ok(())
}

fn run_server(state: AppState, listen: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let miner = state
            .wallet
            .public_key_by_address(&state.config.mining_addr)?;
        let addr = listen.unwrap_or_else(|| state.config.listen_addr.clone());

        let storage = Arc::new(state.storage);
        let blockchain = Arc::new(RwLock::new(state.blockchain));
        let wallet = Arc::new(state.wallet);

        let (workers, handles) = LedgerWorkers::spawn(
            blockchain.clone(),
            wallet.clone(),
            miner,
            storage.clone(),
            state.config.order_queue,
        );

        let app = create_router(ApiState {
            blockchain: blockchain.clone(),
            wallet,
            workers,
        });

        println!("🚀 REST API server starting on http://{}", addr);
        println!();
        println!("📖 Available endpoints:");
        println!("   GET  /health                      - Health check");
        println!("   GET  /api/chain                   - Blockchain info");
        println!("   GET  /api/chain/blocks/{{height}}   - Get block");
        println!("   GET  /api/chain/validate          - Validate chain");
        println!("   POST /api/mine                    - Mine block");
        println!("   POST /api/transactions            - Submit transfer");
        println!("   GET  /api/transactions/{{hash}}     - Get transaction");
        println!("   GET  /api/mempool                 - Pending transactions");
        println!("   GET  /api/funds                   - Wallet funds");
        println!();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
                println!("\n📴 Shutting down API server...");
            })
            .await?;

        // The router owned the last worker handles; let the queues drain
        handles.join().await;

        println!("💾 Saving data...");
        storage.save(&*blockchain.read().await)?;
        println!("✅ Data saved successfully!");

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
