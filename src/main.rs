//! Somnia testnet transaction farmer
//!
//! Generates on-chain volume from one funded account: repeated native STT
//! transfers to fresh random addresses, QuickSwap-style router swaps and
//! PING/PONG pool swaps, each repeated a configured number of times and
//! executed strictly one receipt at a time.

use anyhow::Result;
use clap::Parser;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::to_checksum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod chain;
mod config;
mod error;
mod farm;
mod tx;

use chain::{ChainGateway, TokenBalance};
use config::Settings;
use error::FarmerError;
use ethers::types::U256;
use farm::ping_pong::PingPongSwap;
use farm::quick_swap::QuickSwapDex;
use tx::{TxSender, CHAIN_ID};

/// Minimum native balance required to start farming, in STT
const BALANCE_THRESHOLD_STT: f64 = 0.3;

#[derive(Parser, Debug)]
#[command(author, version, about = "Somnia testnet transaction farming bot")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let gateway = Arc::new(ChainGateway::connect(
        &settings.api.rpc_url,
        settings.api.proxy.as_deref(),
    )?);
    info!("Connected to RPC: {}", settings.api.rpc_url);

    let wallet: LocalWallet = settings
        .account
        .private_key
        .parse::<LocalWallet>()
        .map_err(|e| FarmerError::Wallet(format!("Invalid private key: {}", e)))?
        .with_chain_id(CHAIN_ID);
    info!("Account address: {}", to_checksum(&wallet.address(), None));

    let balance = TokenBalance::native(gateway.native_balance(wallet.address()).await?);
    info!("Balance: {:.6} STT", balance.human());
    if !meets_balance_threshold(balance.human()) {
        error!(
            "Balance is too low, required at least {} STT",
            BALANCE_THRESHOLD_STT
        );
        return Ok(());
    }

    let mut rng = StdRng::from_entropy();
    let sender = TxSender::new(gateway.clone(), wallet);
    let repeat = settings.account.tran_count;

    if settings.farm.stt_send {
        let gas_price = settings.api.gas_price.map(U256::from);
        farm::send_native::run(&gateway, &sender, repeat, gas_price, &mut rng).await?;
    }

    if settings.farm.ping_pong_swap {
        if let Some(cfg) = settings.ping_pong.as_ref() {
            let pool = PingPongSwap::new(gateway.clone(), sender.clone(), cfg)?;
            pool.run(repeat, &mut rng).await?;
        }
    }

    if settings.farm.quick_swap {
        if let Some(cfg) = settings.quick_swap.as_ref() {
            let dex = QuickSwapDex::new(gateway.clone(), sender.clone(), cfg)?;
            farm::quick_swap::run(&dex, repeat, &mut rng).await?;
        }
    }

    Ok(())
}

/// Whether the funded account can cover a farming run
fn meets_balance_threshold(balance_stt: f64) -> bool {
    balance_stt >= BALANCE_THRESHOLD_STT
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,somnia_farmer=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
