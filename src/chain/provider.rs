//! HTTP gateway to the chain RPC node

use super::TokenBalance;
use crate::error::{FarmerError, FarmerResult};

use ethers::abi::Token;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, TxHash, U256};
use std::time::Duration;
use tokio::time::timeout;

/// How often the receipt poll re-queries the node
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Narrow interface to the chain node
///
/// Generic over the JSON-RPC transport so tests can run against
/// `Provider::mocked()`.
pub struct ChainGateway<C: JsonRpcClient = Http> {
    provider: Provider<C>,
}

impl ChainGateway<Http> {
    /// Connect over HTTP, optionally through a proxy
    pub fn connect(rpc_url: &str, proxy: Option<&str>) -> FarmerResult<Self> {
        let url = url::Url::parse(rpc_url)
            .map_err(|e| FarmerError::Config(format!("Invalid RPC URL: {}", e)))?;

        let mut client = reqwest::Client::builder();
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| FarmerError::Config(format!("Invalid proxy URL: {}", e)))?;
            client = client.proxy(proxy);
        }
        let client = client
            .build()
            .map_err(|e| FarmerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            provider: Provider::new(Http::new_with_client(url, client)),
        })
    }
}

impl<C: JsonRpcClient> ChainGateway<C> {
    /// Wrap an existing provider, letting tests run on a mock transport
    #[cfg(test)]
    pub fn new(provider: Provider<C>) -> Self {
        Self { provider }
    }

    /// Native balance in wei
    pub async fn native_balance(&self, address: Address) -> FarmerResult<U256> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    /// Current on-chain transaction count (the next nonce)
    pub async fn transaction_count(&self, address: Address) -> FarmerResult<U256> {
        Ok(self.provider.get_transaction_count(address, None).await?)
    }

    /// Current network gas price in wei
    pub async fn gas_price(&self) -> FarmerResult<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    /// Simulation-based gas estimate for a transaction
    pub async fn estimate_gas(&self, tx: &TypedTransaction) -> FarmerResult<U256> {
        self.provider
            .estimate_gas(tx, None)
            .await
            .map_err(|e| FarmerError::GasEstimation(e.to_string()))
    }

    /// Timestamp of the latest block
    pub async fn latest_timestamp(&self) -> FarmerResult<u64> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await?
            .ok_or_else(|| FarmerError::ChainData("node returned no latest block".to_string()))?;
        Ok(block.timestamp.as_u64())
    }

    /// Broadcast a signed raw transaction, returning its hash
    pub async fn send_raw(&self, raw: Bytes) -> FarmerResult<TxHash> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(pending.tx_hash())
    }

    /// Block until a receipt is available
    ///
    /// With `wait` set, an elapsed limit surfaces as a timeout error; the
    /// transaction may still be included later. Without it the wait is
    /// unbounded.
    pub async fn await_receipt(
        &self,
        tx_hash: TxHash,
        wait: Option<Duration>,
    ) -> FarmerResult<TransactionReceipt> {
        match wait {
            Some(limit) => timeout(limit, self.poll_receipt(tx_hash))
                .await
                .map_err(|_| FarmerError::Timeout {
                    operation: format!("receipt of {:?}", tx_hash),
                })?,
            None => self.poll_receipt(tx_hash).await,
        }
    }

    async fn poll_receipt(&self, tx_hash: TxHash) -> FarmerResult<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// ERC-20 balance and decimal precision for an owner
    pub async fn erc20_balance(
        &self,
        token: Address,
        owner: Address,
    ) -> FarmerResult<TokenBalance> {
        let raw = self
            .call_uint(token, "balanceOf", &[Token::Address(owner)])
            .await?;
        let decimals = self.call_uint(token, "decimals", &[]).await?.low_u64() as u8;
        Ok(TokenBalance { raw, decimals })
    }

    /// `eth_call` a single-uint-returning ERC-20 function
    async fn call_uint(&self, to: Address, name: &str, args: &[Token]) -> FarmerResult<U256> {
        let function = super::erc20_abi()
            .function(name)
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;
        let data = function
            .encode_input(args)
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;

        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let output = self.provider.call(&tx, None).await?;

        let mut tokens = function
            .decode_output(&output)
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;
        match tokens.pop() {
            Some(Token::Uint(value)) => Ok(value),
            other => Err(FarmerError::Encoding(format!(
                "unexpected output from {}: {:?}",
                name, other
            ))),
        }
    }
}
