//! Repeated native STT transfers to freshly generated addresses

use crate::chain::ChainGateway;
use crate::error::{FarmerError, FarmerResult};
use crate::tx::{TxBuilder, TxSender, TxStatus};

use ethers::providers::JsonRpcClient;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use rand::{CryptoRng, Rng};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Transfer amount bounds in STT
pub const MIN_TRANSFER_STT: f64 = 0.001;
pub const MAX_TRANSFER_STT: f64 = 0.02;

/// Receipt wait applied only on this path; swaps wait unbounded
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Run the transfer campaign
///
/// The nonce is fetched once and incremented locally per iteration; the gas
/// price is resolved once (config override or a single network query).
pub async fn run<C, R>(
    gateway: &Arc<ChainGateway<C>>,
    sender: &TxSender<C>,
    tran_count: u32,
    gas_price_override: Option<U256>,
    rng: &mut R,
) -> FarmerResult<()>
where
    C: JsonRpcClient,
    R: Rng + CryptoRng,
{
    let builder = TxBuilder::new(gateway.clone(), sender.address());

    let mut nonce = gateway.transaction_count(sender.address()).await?;
    let gas_price = match gas_price_override {
        Some(price) => price,
        None => gateway.gas_price().await?,
    };

    for _ in 0..tran_count {
        send_one(sender, &builder, nonce, gas_price, rng).await?;
        nonce += U256::one();
    }

    Ok(())
}

async fn send_one<C, R>(
    sender: &TxSender<C>,
    builder: &TxBuilder<C>,
    nonce: U256,
    gas_price: U256,
    rng: &mut R,
) -> FarmerResult<()>
where
    C: JsonRpcClient,
    R: Rng + CryptoRng,
{
    let amount = draw_amount(rng);
    let recipient = random_recipient(rng);
    let value = ethers::utils::parse_ether(amount)
        .map_err(|e| FarmerError::Transaction(format!("invalid transfer amount: {}", e)))?;

    let tx = builder
        .native_transfer(recipient, value, nonce, gas_price)
        .await?;

    info!("Sending {} STT to {:?}. Nonce: {}", amount, recipient, nonce);
    let receipt = sender.submit(&tx, Some(RECEIPT_TIMEOUT)).await?;
    info!(
        "Transaction {:?} was {}",
        receipt.transaction_hash,
        TxStatus::from(&receipt)
    );

    Ok(())
}

/// Uniform amount in [0.001, 0.02] STT, rounded to 6 decimals
pub fn draw_amount<R: Rng>(rng: &mut R) -> f64 {
    let amount = rng.gen_range(MIN_TRANSFER_STT..=MAX_TRANSFER_STT);
    (amount * 1e6).round() / 1e6
}

/// Address of a freshly generated keypair; the key is discarded
pub fn random_recipient<R: Rng + CryptoRng>(rng: &mut R) -> Address {
    LocalWallet::new(rng).address()
}
