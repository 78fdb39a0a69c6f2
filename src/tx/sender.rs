//! Signing and submission of built transactions

use crate::chain::ChainGateway;
use crate::error::{FarmerError, FarmerResult};

use ethers::providers::JsonRpcClient;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionReceipt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Two-valued outcome of an included transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Successful,
    Failed,
}

impl From<&TransactionReceipt> for TxStatus {
    fn from(receipt: &TransactionReceipt) -> Self {
        match receipt.status {
            Some(status) if status.as_u64() == 1 => TxStatus::Successful,
            _ => TxStatus::Failed,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Successful => write!(f, "successful"),
            TxStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Signs with the in-memory account key, broadcasts and awaits inclusion
///
/// A reverted transaction still consumes its nonce; the caller only learns
/// the two-valued status from the receipt.
#[derive(Clone)]
pub struct TxSender<C: JsonRpcClient> {
    gateway: Arc<ChainGateway<C>>,
    wallet: LocalWallet,
}

impl<C: JsonRpcClient> TxSender<C> {
    pub fn new(gateway: Arc<ChainGateway<C>>, wallet: LocalWallet) -> Self {
        Self { gateway, wallet }
    }

    /// The account address derived from the signing key
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign, broadcast and block until a receipt is observed
    ///
    /// `receipt_wait` bounds the wait on the transfer path; swap paths pass
    /// `None` and wait unbounded.
    pub async fn submit(
        &self,
        tx: &TypedTransaction,
        receipt_wait: Option<Duration>,
    ) -> FarmerResult<TransactionReceipt> {
        let signature = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| FarmerError::Wallet(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);

        let tx_hash = self.gateway.send_raw(raw).await?;
        info!("Transaction sent: {:?}", tx_hash);

        self.gateway.await_receipt(tx_hash, receipt_wait).await
    }
}
