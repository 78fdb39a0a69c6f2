//! PING/PONG swaps through a fee-tiered pool router
//!
//! Unlike the quick-swap farm there is no gas-estimation fallback here: a
//! failed estimate aborts the run.

use crate::chain::{parse_address, ChainGateway};
use crate::config::PingPongSettings;
use crate::error::{FarmerError, FarmerResult};
use crate::tx::{TxBuilder, TxSender, TxStatus};

use ethers::abi::{Abi, Token};
use ethers::providers::JsonRpcClient;
use ethers::types::{Address, Bytes, TransactionReceipt, U256};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Fixed fee tier of the PING/PONG pool
pub const SWAP_FEE_TIER: u32 = 500;

pub struct PingPongSwap<C: JsonRpcClient> {
    gateway: Arc<ChainGateway<C>>,
    sender: TxSender<C>,
    builder: TxBuilder<C>,
    abi: Abi,
    router: Address,
    ping: Address,
    pong: Address,
}

impl<C: JsonRpcClient> PingPongSwap<C> {
    pub fn new(
        gateway: Arc<ChainGateway<C>>,
        sender: TxSender<C>,
        settings: &PingPongSettings,
    ) -> FarmerResult<Self> {
        let abi: Abi = serde_json::from_str(&settings.router_abi)
            .map_err(|e| FarmerError::Config(format!("Invalid ping_pong.router_abi: {}", e)))?;
        abi.function("exactInputSingle").map_err(|_| {
            FarmerError::Config("ping_pong router ABI is missing `exactInputSingle`".to_string())
        })?;

        let router = parse_address(&settings.router_contract, "ping_pong.router_contract")?;
        let ping = parse_address(&settings.ping_contract, "ping_pong.ping_contract")?;
        let pong = parse_address(&settings.pong_contract, "ping_pong.pong_contract")?;

        let builder = TxBuilder::new(gateway.clone(), sender.address());

        Ok(Self {
            gateway,
            sender,
            builder,
            abi,
            router,
            ping,
            pong,
        })
    }

    pub async fn run<R: Rng>(&self, repeat: u32, rng: &mut R) -> FarmerResult<()> {
        for _ in 0..repeat {
            self.swap_once(rng).await?;
        }
        Ok(())
    }

    /// One swap in a random direction, sized at up to half the balance
    ///
    /// Returns `None` (a skip, not an error) when the source side cannot
    /// cover a single whole token.
    pub async fn swap_once<R: Rng>(
        &self,
        rng: &mut R,
    ) -> FarmerResult<Option<TransactionReceipt>> {
        let account = self.sender.address();
        let ping_balance = self.gateway.erc20_balance(self.ping, account).await?;
        let pong_balance = self.gateway.erc20_balance(self.pong, account).await?;

        info!(
            "Ping balance: {:.6} | Pong balance: {:.6}",
            ping_balance.human(),
            pong_balance.human()
        );

        let ping_to_pong = rng.gen_bool(0.5);
        let (token_in, token_out, balance) = if ping_to_pong {
            (self.ping, self.pong, ping_balance)
        } else {
            (self.pong, self.ping, pong_balance)
        };

        let Some(max_swap) = max_swap_human(balance.human()) else {
            warn!("Not enough balance to swap.");
            return Ok(None);
        };

        let amount_in_human = rng.gen_range(1..=max_swap);
        let amount_in = U256::from(amount_in_human) * U256::exp10(usize::from(balance.decimals));

        info!(
            "Swapping {} {}",
            amount_in_human,
            if ping_to_pong { "PING" } else { "PONG" }
        );

        let data = self.swap_call_data(token_in, token_out, amount_in)?;
        let tx = self.builder.pool_swap(self.router, data).await?;
        let receipt = self.sender.submit(&tx, None).await?;
        info!("Transaction was {}", TxStatus::from(&receipt));

        Ok(Some(receipt))
    }

    fn swap_call_data(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> FarmerResult<Bytes> {
        let function = self
            .abi
            .function("exactInputSingle")
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;

        let params = Token::Tuple(vec![
            Token::Address(token_in),
            Token::Address(token_out),
            Token::Uint(U256::from(SWAP_FEE_TIER)),
            Token::Address(self.sender.address()),
            Token::Uint(amount_in),
            // amountOutMinimum: zero by design, no slippage protection
            Token::Uint(U256::zero()),
            // sqrtPriceLimitX96
            Token::Uint(U256::zero()),
        ]);

        let data = function
            .encode_input(&[params])
            .map_err(|e| FarmerError::Encoding(e.to_string()))?;
        Ok(data.into())
    }
}

/// Largest whole-token amount the swap may use: floor of half the balance
///
/// `None` means the iteration should be skipped.
pub fn max_swap_human(balance_human: f64) -> Option<u64> {
    let half = (balance_human / 2.0).floor();
    if half < 1.0 {
        None
    } else {
        Some(half as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::CHAIN_ID;
    use ethers::abi::encode;
    use ethers::providers::Provider;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::{TransactionReceipt, TxHash};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const POOL_ROUTER_ABI: &str = r#"
    [
        {"inputs":[{"components":[
            {"name":"tokenIn","type":"address"},
            {"name":"tokenOut","type":"address"},
            {"name":"fee","type":"uint24"},
            {"name":"recipient","type":"address"},
            {"name":"amountIn","type":"uint256"},
            {"name":"amountOutMinimum","type":"uint256"},
            {"name":"sqrtPriceLimitX96","type":"uint160"}
        ],"name":"params","type":"tuple"}],
        "name":"exactInputSingle","outputs":[{"name":"amountOut","type":"uint256"}],
        "stateMutability":"payable","type":"function"}
    ]
    "#;

    fn test_settings() -> PingPongSettings {
        PingPongSettings {
            router_contract: "0x6aac14f090a35eea150705f72d90e4cdc4a49b2c".to_string(),
            ping_contract: "0xbecd9b5f373877881d91cbdbaf013d97eb532154".to_string(),
            pong_contract: "0x7968ac15a72629e05f41b8271e4e7292e0cc9f90".to_string(),
            router_abi: POOL_ROUTER_ABI.to_string(),
        }
    }

    fn test_pool(
    ) -> (PingPongSwap<ethers::providers::MockProvider>, ethers::providers::MockProvider) {
        let (provider, mock) = Provider::mocked();
        let gateway = Arc::new(ChainGateway::new(provider));
        let wallet = LocalWallet::new(&mut StdRng::seed_from_u64(1)).with_chain_id(CHAIN_ID);
        let sender = TxSender::new(gateway.clone(), wallet);
        let pool = PingPongSwap::new(gateway, sender, &test_settings()).unwrap();
        (pool, mock)
    }

    fn push_balance(mock: &ethers::providers::MockProvider, raw: U256, decimals: u64) {
        // Popped in call order balanceOf then decimals, so push in reverse
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(U256::from(decimals))])))
            .unwrap();
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(raw)])))
            .unwrap();
    }

    #[test]
    fn half_balance_sizing() {
        assert_eq!(max_swap_human(10.0), Some(5));
        assert_eq!(max_swap_human(4.0), Some(2));
        assert_eq!(max_swap_human(5.5), Some(2));
        assert_eq!(max_swap_human(1.9), None);
        assert_eq!(max_swap_human(0.0), None);
    }

    #[test]
    fn amounts_are_whole_tokens_within_half_balance() {
        let mut rng = StdRng::seed_from_u64(21);
        let max = max_swap_human(10.0).unwrap();
        for _ in 0..500 {
            let amount = rng.gen_range(1..=max);
            assert!((1..=5).contains(&amount));
        }
    }

    #[test]
    fn swap_calldata_carries_fee_tier_and_zero_min_out() {
        let (pool, _mock) = test_pool();
        let data = pool
            .swap_call_data(pool.ping, pool.pong, U256::exp10(18))
            .unwrap();

        let function = pool.abi.function("exactInputSingle").unwrap();
        let mut tokens = function.decode_input(&data[4..]).unwrap();
        let fields = match tokens.pop() {
            Some(Token::Tuple(fields)) => fields,
            other => panic!("expected params tuple, got {:?}", other),
        };
        assert_eq!(fields[2], Token::Uint(U256::from(SWAP_FEE_TIER)));
        assert_eq!(fields[3], Token::Address(pool.sender.address()));
        assert_eq!(fields[5], Token::Uint(U256::zero()));
        assert_eq!(fields[6], Token::Uint(U256::zero()));
    }

    #[tokio::test]
    async fn swap_executes_when_balances_suffice() {
        let (pool, mock) = test_pool();

        // Reverse call order: receipt, broadcast, estimate, gas price,
        // nonce, pong balance, ping balance.
        let mut receipt = TransactionReceipt::default();
        receipt.status = Some(1u64.into());
        mock.push::<TransactionReceipt, _>(receipt).unwrap();
        mock.push::<TxHash, _>(TxHash::repeat_byte(0xab)).unwrap();
        mock.push::<U256, _>(U256::from(100_000u64)).unwrap();
        mock.push::<U256, _>(U256::from(1_000_000_000u64)).unwrap();
        mock.push::<U256, _>(U256::from(0u64)).unwrap();
        push_balance(&mock, U256::exp10(19), 18); // pong: 10.0
        push_balance(&mock, U256::exp10(19), 18); // ping: 10.0

        let mut rng = StdRng::seed_from_u64(33);
        let receipt = pool.swap_once(&mut rng).await.unwrap();
        assert!(receipt.is_some());
        assert_eq!(
            TxStatus::from(&receipt.unwrap()),
            TxStatus::Successful
        );
    }

    #[tokio::test]
    async fn swap_skips_when_half_balance_rounds_to_zero() {
        let (pool, mock) = test_pool();

        // Both sides hold 1.9 tokens; either direction skips.
        push_balance(&mock, U256::from(1_900_000u64), 6);
        push_balance(&mock, U256::from(1_900_000u64), 6);

        let mut rng = StdRng::seed_from_u64(34);
        let receipt = pool.swap_once(&mut rng).await.unwrap();
        assert!(receipt.is_none());

        // Repeat invocations with the same state stay a no-op
        push_balance(&mock, U256::from(1_900_000u64), 6);
        push_balance(&mock, U256::from(1_900_000u64), 6);
        let receipt = pool.swap_once(&mut rng).await.unwrap();
        assert!(receipt.is_none());
    }

    #[test]
    fn rejects_abi_without_swap_entry_point() {
        let (provider, _mock) = Provider::mocked();
        let gateway = Arc::new(ChainGateway::new(provider));
        let wallet = LocalWallet::new(&mut StdRng::seed_from_u64(1)).with_chain_id(CHAIN_ID);
        let sender = TxSender::new(gateway.clone(), wallet);

        let mut settings = test_settings();
        settings.router_abi = "[]".to_string();
        let err = PingPongSwap::new(gateway, sender, &settings).err().unwrap();
        assert!(matches!(err, FarmerError::Config(_)));
    }
}
