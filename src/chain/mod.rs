//! Chain module - the narrow gateway to the Somnia RPC node
//!
//! Everything the farmer needs from the chain goes through [`ChainGateway`]:
//! balance and nonce queries, gas price, gas estimation, raw broadcast and
//! receipt polling. Token amounts are carried as [`TokenBalance`] pairs of
//! raw integer and decimal precision.

pub mod provider;

pub use provider::ChainGateway;

use crate::error::{FarmerError, FarmerResult};

use ethers::abi::Abi;
use ethers::types::{Address, U256};

/// Decimal precision of the native STT asset
pub const NATIVE_DECIMALS: u8 = 18;

/// Minimal ERC-20 surface used by the farmer, plus the wrapped-native
/// deposit/withdraw entry points.
const ERC20_ABI_JSON: &str = r#"
[
    {"inputs":[{"name":"_owner","type":"address"}],"name":"balanceOf","outputs":[{"name":"balance","type":"uint256"}],"stateMutability":"view","type":"function"},
    {"inputs":[],"name":"decimals","outputs":[{"name":"","type":"uint8"}],"stateMutability":"view","type":"function"},
    {"inputs":[],"name":"deposit","outputs":[],"stateMutability":"payable","type":"function"},
    {"inputs":[{"name":"wad","type":"uint256"}],"name":"withdraw","outputs":[],"stateMutability":"nonpayable","type":"function"},
    {"inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],"name":"approve","outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable","type":"function"}
]
"#;

lazy_static::lazy_static! {
    static ref ERC20_ABI: Abi =
        serde_json::from_str(ERC20_ABI_JSON).expect("embedded ERC-20 ABI is valid JSON");
}

/// Shared ERC-20 ABI used for balance queries and token call encoding
pub fn erc20_abi() -> &'static Abi {
    &ERC20_ABI
}

/// A raw token amount together with its decimal precision
///
/// Balances are always queried fresh before a sizing decision; they change
/// after every successful swap and must not be cached.
#[derive(Debug, Clone, Copy)]
pub struct TokenBalance {
    pub raw: U256,
    pub decimals: u8,
}

impl TokenBalance {
    /// Wrap a native-asset balance (fixed 18 decimals)
    pub fn native(raw: U256) -> Self {
        Self {
            raw,
            decimals: NATIVE_DECIMALS,
        }
    }

    /// Human-readable value, e.g. 1_500_000 raw at 6 decimals -> 1.5
    pub fn human(&self) -> f64 {
        ethers::utils::format_units(self.raw, u32::from(self.decimals))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
}

/// Convert a human-unit amount to raw token units
pub fn to_raw_units(amount: f64, decimals: u8) -> U256 {
    let scaled = amount * 10f64.powi(i32::from(decimals));
    U256::from(scaled as u128)
}

/// Parse a configured contract address, naming the offending field on error
pub fn parse_address(value: &str, field: &str) -> FarmerResult<Address> {
    let hex = value.strip_prefix("0x").unwrap_or(value);
    hex.parse()
        .map_err(|e| FarmerError::Config(format!("Invalid address in {}: {}", field, e)))
}
