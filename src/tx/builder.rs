//! Transaction construction for the three farming recipes
//!
//! Recipes differ deliberately, matching the behavior of each farm path:
//! - `native_transfer`: caller-managed nonce and gas price, strict gas
//!   estimation, chain id set.
//! - `routed_call`: fresh nonce and gas price per call, gas estimation that
//!   falls back to [`FALLBACK_GAS`] on any failure, chain id left unset.
//! - `pool_swap`: fresh nonce and gas price, strict estimation with a 1.2x
//!   safety multiplier, chain id set.

use crate::chain::{erc20_abi, ChainGateway};
use crate::error::{FarmerError, FarmerResult};

use ethers::abi::{Abi, Token};
use ethers::providers::JsonRpcClient;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use std::sync::Arc;
use tracing::{info, warn};

/// Somnia testnet chain id
pub const CHAIN_ID: u64 = 50312;

/// Gas limit substituted when estimation fails on the routed-call path
pub const FALLBACK_GAS: u64 = 250_000;

/// Swap deadline window relative to the latest block timestamp
pub const DEADLINE_WINDOW_SECS: u64 = 1200;

/// Safety multiplier applied to pool-swap gas estimates, in percent
pub const POOL_GAS_MULTIPLIER_PCT: u64 = 120;

/// Semantic description of a desired on-chain effect
#[derive(Debug, Clone)]
pub enum Intent {
    /// Deposit native currency into the wrapped-native token
    Wrap {
        amount: U256,
    },
    /// Withdraw native currency from the wrapped-native token
    Unwrap {
        amount: U256,
    },
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    /// Single-hop exact-input swap through the router. `value` carries the
    /// attached native amount when the source asset is native, else zero.
    SwapExactIn {
        token_in: Address,
        token_out: Address,
        recipient: Address,
        amount_in: U256,
        min_out: U256,
        value: U256,
    },
    /// Router-side unwrap of the wrapped-native balance, used as the tail of
    /// a swap-to-native bundle
    UnwrapTo {
        min_amount: U256,
        recipient: Address,
    },
    /// Multiple router calls bundled into one multicall transaction
    Bundle(Vec<Intent>),
}

impl Intent {
    /// Whether encoding this intent requires a block-timestamp deadline
    fn needs_deadline(&self) -> bool {
        match self {
            Intent::SwapExactIn { .. } => true,
            Intent::Bundle(subs) => subs.iter().any(Intent::needs_deadline),
            _ => false,
        }
    }
}

/// A fully encoded call: destination, calldata and attached value
pub struct EncodedCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Encodes intents against the swap router and token contracts
pub struct RouterCodec {
    abi: Abi,
    router: Address,
    wrapped_native: Address,
}

impl RouterCodec {
    /// Validate the router ABI up front so a bad config fails at startup
    pub fn new(abi: Abi, router: Address, wrapped_native: Address) -> FarmerResult<Self> {
        for name in ["exactInputSingle", "multicall", "unwrapWNativeToken"] {
            abi.function(name).map_err(|_| {
                FarmerError::Config(format!("router ABI is missing `{}`", name))
            })?;
        }
        Ok(Self {
            abi,
            router,
            wrapped_native,
        })
    }

    pub fn router(&self) -> Address {
        self.router
    }

    /// Encode an intent into a submittable call
    ///
    /// Every sub-call of a bundle is encoded with the same `deadline`; the
    /// builder computes it from one block read per built transaction.
    pub fn encode(&self, intent: &Intent, deadline: U256) -> FarmerResult<EncodedCall> {
        match intent {
            Intent::Wrap { amount } => Ok(EncodedCall {
                to: self.wrapped_native,
                data: encode_erc20("deposit", &[])?,
                value: *amount,
            }),
            Intent::Unwrap { amount } => Ok(EncodedCall {
                to: self.wrapped_native,
                data: encode_erc20("withdraw", &[Token::Uint(*amount)])?,
                value: U256::zero(),
            }),
            Intent::Approve {
                token,
                spender,
                amount,
            } => Ok(EncodedCall {
                to: *token,
                data: encode_erc20(
                    "approve",
                    &[Token::Address(*spender), Token::Uint(*amount)],
                )?,
                value: U256::zero(),
            }),
            Intent::SwapExactIn { value, .. } => Ok(EncodedCall {
                to: self.router,
                data: self.router_call_data(intent, deadline)?,
                value: *value,
            }),
            Intent::UnwrapTo { .. } => Ok(EncodedCall {
                to: self.router,
                data: self.router_call_data(intent, deadline)?,
                value: U256::zero(),
            }),
            Intent::Bundle(subs) => {
                let mut calls = Vec::with_capacity(subs.len());
                for sub in subs {
                    calls.push(Token::Bytes(
                        self.router_call_data(sub, deadline)?.to_vec(),
                    ));
                }
                Ok(EncodedCall {
                    to: self.router,
                    data: self.encode_router("multicall", &[Token::Array(calls)])?,
                    value: U256::zero(),
                })
            }
        }
    }

    /// Calldata for intents that execute on the router itself
    fn router_call_data(&self, intent: &Intent, deadline: U256) -> FarmerResult<Bytes> {
        match intent {
            Intent::SwapExactIn {
                token_in,
                token_out,
                recipient,
                amount_in,
                min_out,
                ..
            } => {
                let params = Token::Tuple(vec![
                    Token::Address(*token_in),
                    Token::Address(*token_out),
                    // deployer: default pool of the pair
                    Token::Address(Address::zero()),
                    Token::Address(*recipient),
                    Token::Uint(deadline),
                    Token::Uint(*amount_in),
                    Token::Uint(*min_out),
                    // limitSqrtPrice
                    Token::Uint(U256::zero()),
                ]);
                self.encode_router("exactInputSingle", &[params])
            }
            Intent::UnwrapTo {
                min_amount,
                recipient,
            } => self.encode_router(
                "unwrapWNativeToken",
                &[Token::Uint(*min_amount), Token::Address(*recipient)],
            ),
            other => Err(FarmerError::Encoding(format!(
                "{:?} cannot be routed through the swap router",
                other
            ))),
        }
    }

    fn encode_router(&self, name: &str, args: &[Token]) -> FarmerResult<Bytes> {
        let function = self
            .abi
            .function(name)
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;
        let data = function
            .encode_input(args)
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;
        Ok(data.into())
    }
}

fn encode_erc20(name: &str, args: &[Token]) -> FarmerResult<Bytes> {
    let function = erc20_abi()
        .function(name)
        .map_err(|e| FarmerError::Encoding(e.to_string()))?;
    let data = function
        .encode_input(args)
        .map_err(|e| FarmerError::Encoding(e.to_string()))?;
    Ok(data.into())
}

/// Builds chain-ready legacy transaction parameters from intents
#[derive(Clone)]
pub struct TxBuilder<C: JsonRpcClient> {
    gateway: Arc<ChainGateway<C>>,
    sender: Address,
}

impl<C: JsonRpcClient> TxBuilder<C> {
    pub fn new(gateway: Arc<ChainGateway<C>>, sender: Address) -> Self {
        Self { gateway, sender }
    }

    /// Plain native transfer with caller-sequenced nonce
    ///
    /// Gas estimation failure propagates and aborts the campaign.
    pub async fn native_transfer(
        &self,
        to: Address,
        amount: U256,
        nonce: U256,
        gas_price: U256,
    ) -> FarmerResult<TypedTransaction> {
        let probe: TypedTransaction = TransactionRequest::new()
            .from(self.sender)
            .to(to)
            .value(amount)
            .into();
        let gas_limit = self.gateway.estimate_gas(&probe).await?;
        info!("Estimated gas: {}", gas_limit);

        let tx = TransactionRequest::new()
            .from(self.sender)
            .to(to)
            .value(amount)
            .nonce(nonce)
            .chain_id(CHAIN_ID)
            .gas(gas_limit)
            .gas_price(gas_price);
        Ok(tx.into())
    }

    /// Router or token call with gas-estimation fallback
    ///
    /// Nonce and gas price are re-queried per call; a failed estimate (for
    /// example a revert during simulation) substitutes [`FALLBACK_GAS`]
    /// instead of aborting, so the farming loop keeps running unattended.
    pub async fn routed_call(
        &self,
        codec: &RouterCodec,
        intent: &Intent,
    ) -> FarmerResult<TypedTransaction> {
        let nonce = self.gateway.transaction_count(self.sender).await?;
        let gas_price = self.gateway.gas_price().await?;

        let deadline = if intent.needs_deadline() {
            U256::from(self.gateway.latest_timestamp().await? + DEADLINE_WINDOW_SECS)
        } else {
            U256::zero()
        };
        let call = codec.encode(intent, deadline)?;

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(self.sender)
            .to(call.to)
            .data(call.data)
            .value(call.value)
            .nonce(nonce)
            .gas_price(gas_price)
            .into();

        let gas_limit = match self.gateway.estimate_gas(&tx).await {
            Ok(gas) => gas,
            Err(e) => {
                warn!("Gas estimation failed, using fallback {}: {}", FALLBACK_GAS, e);
                U256::from(FALLBACK_GAS)
            }
        };
        tx.set_gas(gas_limit);
        Ok(tx)
    }

    /// Fee-tiered pool swap with a 1.2x gas safety margin
    ///
    /// Unlike [`routed_call`](Self::routed_call), estimation failure here
    /// propagates as an error.
    pub async fn pool_swap(&self, router: Address, data: Bytes) -> FarmerResult<TypedTransaction> {
        let nonce = self.gateway.transaction_count(self.sender).await?;
        let gas_price = self.gateway.gas_price().await?;

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(self.sender)
            .to(router)
            .data(data)
            .value(U256::zero())
            .nonce(nonce)
            .chain_id(CHAIN_ID)
            .gas_price(gas_price)
            .into();

        let estimated = self.gateway.estimate_gas(&tx).await?;
        info!("Estimated gas: {}", estimated);

        tx.set_gas(estimated * POOL_GAS_MULTIPLIER_PCT / 100);
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::Provider;
    use ethers::types::{Block, H256, U64};

    /// Router ABI shaped like the quick-swap router (deadline inside the
    /// params tuple, multicall bundling, router-side unwrap)
    const TEST_ROUTER_ABI: &str = r#"
    [
        {"inputs":[{"components":[
            {"name":"tokenIn","type":"address"},
            {"name":"tokenOut","type":"address"},
            {"name":"deployer","type":"address"},
            {"name":"recipient","type":"address"},
            {"name":"deadline","type":"uint256"},
            {"name":"amountIn","type":"uint256"},
            {"name":"amountOutMinimum","type":"uint256"},
            {"name":"limitSqrtPrice","type":"uint160"}
        ],"name":"params","type":"tuple"}],
        "name":"exactInputSingle","outputs":[{"name":"amountOut","type":"uint256"}],
        "stateMutability":"payable","type":"function"},
        {"inputs":[{"name":"data","type":"bytes[]"}],"name":"multicall",
        "outputs":[{"name":"results","type":"bytes[]"}],"stateMutability":"payable","type":"function"},
        {"inputs":[{"name":"amountMinimum","type":"uint256"},{"name":"recipient","type":"address"}],
        "name":"unwrapWNativeToken","outputs":[],"stateMutability":"payable","type":"function"}
    ]
    "#;

    fn test_codec() -> RouterCodec {
        let abi: Abi = serde_json::from_str(TEST_ROUTER_ABI).unwrap();
        RouterCodec::new(abi, Address::repeat_byte(0xaa), Address::repeat_byte(0xbb)).unwrap()
    }

    fn decode_swap_params(codec: &RouterCodec, data: &[u8]) -> Vec<Token> {
        let function = codec.abi.function("exactInputSingle").unwrap();
        let mut tokens = function.decode_input(&data[4..]).unwrap();
        match tokens.pop() {
            Some(Token::Tuple(fields)) => fields,
            other => panic!("expected params tuple, got {:?}", other),
        }
    }

    #[test]
    fn codec_rejects_abi_without_multicall() {
        let abi: Abi = serde_json::from_str("[]").unwrap();
        let err = RouterCodec::new(abi, Address::zero(), Address::zero())
            .err()
            .unwrap();
        assert!(matches!(err, FarmerError::Config(_)));
    }

    #[test]
    fn wrap_attaches_value_and_targets_wrapped_native() {
        let codec = test_codec();
        let call = codec
            .encode(&Intent::Wrap { amount: U256::from(7u64) }, U256::zero())
            .unwrap();
        assert_eq!(call.to, Address::repeat_byte(0xbb));
        assert_eq!(call.value, U256::from(7u64));
        assert!(!call.data.is_empty());
    }

    #[test]
    fn bundle_sub_calls_share_one_deadline() {
        let codec = test_codec();
        let intent = Intent::Bundle(vec![
            Intent::SwapExactIn {
                token_in: Address::repeat_byte(1),
                token_out: Address::repeat_byte(0xbb),
                recipient: Address::zero(),
                amount_in: U256::from(100u64),
                min_out: U256::zero(),
                value: U256::zero(),
            },
            Intent::UnwrapTo {
                min_amount: U256::zero(),
                recipient: Address::repeat_byte(2),
            },
        ]);

        let call = codec.encode(&intent, U256::from(42u64)).unwrap();
        assert_eq!(call.to, codec.router());
        assert_eq!(call.value, U256::zero());

        let multicall = codec.abi.function("multicall").unwrap();
        let tokens = multicall.decode_input(&call.data[4..]).unwrap();
        let calls = match &tokens[0] {
            Token::Array(calls) => calls.clone(),
            other => panic!("expected bytes array, got {:?}", other),
        };
        assert_eq!(calls.len(), 2);

        let swap_data = match &calls[0] {
            Token::Bytes(bytes) => bytes.clone(),
            other => panic!("expected bytes, got {:?}", other),
        };
        let fields = decode_swap_params(&codec, &swap_data);
        // deadline is the fifth field of the params tuple
        assert_eq!(fields[4], Token::Uint(U256::from(42u64)));
        // min-out is always zero by design
        assert_eq!(fields[6], Token::Uint(U256::zero()));
    }

    #[test]
    fn token_calls_cannot_be_bundled() {
        let codec = test_codec();
        let intent = Intent::Bundle(vec![Intent::Approve {
            token: Address::zero(),
            spender: Address::zero(),
            amount: U256::one(),
        }]);
        assert!(matches!(
            codec.encode(&intent, U256::zero()),
            Err(FarmerError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn native_transfer_uses_estimate_and_chain_id() {
        let (provider, mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );
        mock.push::<U256, _>(U256::from(21_000u64)).unwrap();

        let tx = builder
            .native_transfer(
                Address::repeat_byte(0x22),
                U256::from(1_000u64),
                U256::from(5u64),
                U256::from(1_000_000_000u64),
            )
            .await
            .unwrap();

        assert_eq!(tx.gas(), Some(&U256::from(21_000u64)));
        assert_eq!(tx.nonce(), Some(&U256::from(5u64)));
        assert_eq!(tx.chain_id(), Some(U64::from(CHAIN_ID)));
    }

    #[tokio::test]
    async fn native_transfer_estimation_failure_propagates() {
        let (provider, _mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );

        let err = builder
            .native_transfer(
                Address::repeat_byte(0x22),
                U256::one(),
                U256::zero(),
                U256::one(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FarmerError::GasEstimation(_)));
    }

    #[tokio::test]
    async fn routed_call_falls_back_on_estimation_failure() {
        let (provider, mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );
        let codec = test_codec();

        // Responses pop in call order: nonce, gas price; the estimate is
        // left unstubbed so estimation fails.
        mock.push::<U256, _>(U256::from(1_000_000_000u64)).unwrap();
        mock.push::<U256, _>(U256::from(7u64)).unwrap();

        let tx = builder
            .routed_call(&codec, &Intent::Wrap { amount: U256::from(10u64) })
            .await
            .unwrap();
        assert_eq!(tx.gas(), Some(&U256::from(FALLBACK_GAS)));
        assert_eq!(tx.nonce(), Some(&U256::from(7u64)));
        assert_eq!(tx.chain_id(), None);
    }

    #[tokio::test]
    async fn routed_call_uses_estimate_when_available() {
        let (provider, mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );
        let codec = test_codec();

        mock.push::<U256, _>(U256::from(52_341u64)).unwrap(); // gas estimate
        mock.push::<U256, _>(U256::from(1_000_000_000u64)).unwrap(); // gas price
        mock.push::<U256, _>(U256::from(0u64)).unwrap(); // nonce

        let tx = builder
            .routed_call(&codec, &Intent::Unwrap { amount: U256::from(10u64) })
            .await
            .unwrap();
        assert_eq!(tx.gas(), Some(&U256::from(52_341u64)));
    }

    #[tokio::test]
    async fn swap_deadline_is_latest_timestamp_plus_window() {
        let (provider, mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );
        let codec = test_codec();

        let mut block = Block::<H256>::default();
        block.timestamp = U256::from(1_000u64);

        mock.push::<U256, _>(U256::from(60_000u64)).unwrap(); // gas estimate
        mock.push::<Block<H256>, _>(block).unwrap(); // latest block
        mock.push::<U256, _>(U256::from(1_000_000_000u64)).unwrap(); // gas price
        mock.push::<U256, _>(U256::from(3u64)).unwrap(); // nonce

        let intent = Intent::SwapExactIn {
            token_in: Address::repeat_byte(0xbb),
            token_out: Address::repeat_byte(0xcc),
            recipient: Address::repeat_byte(0x11),
            amount_in: U256::from(500u64),
            min_out: U256::zero(),
            value: U256::from(500u64),
        };
        let tx = builder.routed_call(&codec, &intent).await.unwrap();

        let fields = decode_swap_params(&codec, tx.data().unwrap());
        assert_eq!(
            fields[4],
            Token::Uint(U256::from(1_000 + DEADLINE_WINDOW_SECS))
        );
        assert_eq!(tx.value(), Some(&U256::from(500u64)));
    }

    #[tokio::test]
    async fn pool_swap_applies_gas_multiplier() {
        let (provider, mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );

        mock.push::<U256, _>(U256::from(100_000u64)).unwrap(); // gas estimate
        mock.push::<U256, _>(U256::from(1_000_000_000u64)).unwrap(); // gas price
        mock.push::<U256, _>(U256::from(9u64)).unwrap(); // nonce

        let tx = builder
            .pool_swap(Address::repeat_byte(0xaa), Bytes::from(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        assert_eq!(tx.gas(), Some(&U256::from(120_000u64)));
        assert_eq!(tx.chain_id(), Some(U64::from(CHAIN_ID)));
    }

    #[tokio::test]
    async fn pool_swap_estimation_failure_propagates() {
        let (provider, mock) = Provider::mocked();
        let builder = TxBuilder::new(
            Arc::new(ChainGateway::new(provider)),
            Address::repeat_byte(0x11),
        );

        mock.push::<U256, _>(U256::from(1_000_000_000u64)).unwrap(); // gas price
        mock.push::<U256, _>(U256::from(9u64)).unwrap(); // nonce

        let err = builder
            .pool_swap(Address::repeat_byte(0xaa), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FarmerError::GasEstimation(_)));
    }
}
