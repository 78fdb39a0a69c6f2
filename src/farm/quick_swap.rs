//! Randomized swaps across the QuickSwap-style router
//!
//! Pairs are drawn uniformly from a fixed table; amounts are sized as a
//! random fraction of the current source balance, capped per pair. All
//! transactions go through the fallback-gas builder path and wait unbounded
//! for their receipts.

use crate::chain::{parse_address, to_raw_units, ChainGateway, TokenBalance};
use crate::config::QuickSwapSettings;
use crate::error::{FarmerError, FarmerResult};
use crate::tx::{Intent, RouterCodec, TxBuilder, TxSender, TxStatus};

use ethers::abi::Abi;
use ethers::providers::JsonRpcClient;
use ethers::types::{Address, TransactionReceipt, U256};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Assets the quick-swap farm trades between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Stt,
    Wstt,
    Usdc,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Stt => write!(f, "STT"),
            Asset::Wstt => write!(f, "WSTT"),
            Asset::Usdc => write!(f, "USDC"),
        }
    }
}

/// A candidate swap with its balance-fraction cap in percent
#[derive(Debug, Clone, Copy)]
pub struct SwapPair {
    pub source: Asset,
    pub target: Asset,
    pub balance_cap_pct: u64,
}

/// Fixed candidate table; selection is uniform
pub const PAIR_TABLE: [SwapPair; 4] = [
    SwapPair { source: Asset::Stt, target: Asset::Wstt, balance_cap_pct: 50 },
    SwapPair { source: Asset::Wstt, target: Asset::Stt, balance_cap_pct: 90 },
    SwapPair { source: Asset::Stt, target: Asset::Usdc, balance_cap_pct: 5 },
    SwapPair { source: Asset::Usdc, target: Asset::Stt, balance_cap_pct: 90 },
];

/// How a (source, target) pair executes on the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// Native deposit into the wrapped token
    Wrap,
    /// Wrapped withdraw back to native
    Unwrap,
    /// Single exact-input swap; native sources attach value instead of
    /// approving the router
    Direct { approve_first: bool, attach_native: bool },
    /// Swap to wrapped then unwrap, bundled in one multicall
    ToNative { approve_first: bool },
}

pub(crate) fn route(source: Asset, target: Asset) -> Route {
    match (source, target) {
        (Asset::Stt, Asset::Wstt) => Route::Wrap,
        (Asset::Wstt, Asset::Stt) => Route::Unwrap,
        (_, Asset::Stt) => Route::ToNative { approve_first: source != Asset::Stt },
        _ => Route::Direct {
            approve_first: source != Asset::Stt,
            attach_native: source == Asset::Stt,
        },
    }
}

pub struct QuickSwapDex<C: JsonRpcClient> {
    gateway: Arc<ChainGateway<C>>,
    sender: TxSender<C>,
    builder: TxBuilder<C>,
    codec: RouterCodec,
    wstt: Address,
    usdc: Address,
}

impl<C: JsonRpcClient> QuickSwapDex<C> {
    pub fn new(
        gateway: Arc<ChainGateway<C>>,
        sender: TxSender<C>,
        settings: &QuickSwapSettings,
    ) -> FarmerResult<Self> {
        let abi: Abi = serde_json::from_str(&settings.router_abi)
            .map_err(|e| FarmerError::Config(format!("Invalid quick_swap.router_abi: {}", e)))?;
        let router = parse_address(&settings.router_contract, "quick_swap.router_contract")?;
        let wstt = parse_address(&settings.wstt_contract, "quick_swap.wstt_contract")?;
        let usdc = parse_address(&settings.usdc_contract, "quick_swap.usdc_contract")?;

        let codec = RouterCodec::new(abi, router, wstt)?;
        let builder = TxBuilder::new(gateway.clone(), sender.address());

        Ok(Self {
            gateway,
            sender,
            builder,
            codec,
            wstt,
            usdc,
        })
    }

    pub fn account(&self) -> Address {
        self.sender.address()
    }

    fn token_address(&self, asset: Asset) -> Address {
        match asset {
            Asset::Stt => Address::zero(),
            Asset::Wstt => self.wstt,
            Asset::Usdc => self.usdc,
        }
    }

    /// Fresh balance of the swap source; native balances carry 18 decimals
    pub async fn source_balance(&self, asset: Asset) -> FarmerResult<TokenBalance> {
        match asset {
            Asset::Stt => Ok(TokenBalance::native(
                self.gateway.native_balance(self.account()).await?,
            )),
            _ => {
                self.gateway
                    .erc20_balance(self.token_address(asset), self.account())
                    .await
            }
        }
    }

    /// Execute one swap, dispatching on the pair shape
    pub async fn swap(
        &self,
        source: Asset,
        target: Asset,
        amount_in: U256,
    ) -> FarmerResult<TransactionReceipt> {
        match route(source, target) {
            Route::Wrap => self.execute(Intent::Wrap { amount: amount_in }).await,
            Route::Unwrap => self.execute(Intent::Unwrap { amount: amount_in }).await,
            Route::ToNative { approve_first } => {
                let token_in = self.token_address(source);
                if approve_first {
                    self.execute(Intent::Approve {
                        token: token_in,
                        spender: self.codec.router(),
                        amount: amount_in,
                    })
                    .await?;
                }
                // Swap into the wrapped token held by the router, then
                // unwrap the whole proceeds to the account.
                self.execute(Intent::Bundle(vec![
                    Intent::SwapExactIn {
                        token_in,
                        token_out: self.wstt,
                        recipient: Address::zero(),
                        amount_in,
                        min_out: U256::zero(),
                        value: U256::zero(),
                    },
                    Intent::UnwrapTo {
                        min_amount: U256::zero(),
                        recipient: self.account(),
                    },
                ]))
                .await
            }
            Route::Direct {
                approve_first,
                attach_native,
            } => {
                // A native source trades through its wrapped form
                let token_in = if source == Asset::Stt {
                    self.wstt
                } else {
                    self.token_address(source)
                };
                if approve_first {
                    self.execute(Intent::Approve {
                        token: token_in,
                        spender: self.codec.router(),
                        amount: amount_in,
                    })
                    .await?;
                }
                self.execute(Intent::SwapExactIn {
                    token_in,
                    token_out: self.token_address(target),
                    recipient: self.account(),
                    amount_in,
                    min_out: U256::zero(),
                    value: if attach_native { amount_in } else { U256::zero() },
                })
                .await
            }
        }
    }

    async fn execute(&self, intent: Intent) -> FarmerResult<TransactionReceipt> {
        let tx = self.builder.routed_call(&self.codec, &intent).await?;
        self.sender.submit(&tx, None).await
    }
}

/// Run the quick-swap campaign
pub async fn run<C, R>(dex: &QuickSwapDex<C>, repeat: u32, rng: &mut R) -> FarmerResult<()>
where
    C: JsonRpcClient,
    R: Rng,
{
    for _ in 0..repeat {
        let pair = PAIR_TABLE[rng.gen_range(0..PAIR_TABLE.len())];

        let balance = dex.source_balance(pair.source).await?;
        if balance.is_zero() {
            warn!("0 {} balance, skipping...", pair.source);
            continue;
        }

        let max_swap = max_swap_amount(balance.human(), pair.balance_cap_pct);
        let amount = rng.gen_range(0.0..=max_swap);
        info!("Swapping {:.3} {} to {}", amount, pair.source, pair.target);

        let receipt = dex
            .swap(pair.source, pair.target, to_raw_units(amount, balance.decimals))
            .await?;
        info!(
            "Tx hash: {:?} - status: {}",
            receipt.transaction_hash,
            TxStatus::from(&receipt)
        );
    }

    Ok(())
}

/// Upper swap bound in human units: the capped fraction of the balance
pub fn max_swap_amount(balance_human: f64, cap_pct: u64) -> f64 {
    balance_human * cap_pct as f64 / 100.0
}
