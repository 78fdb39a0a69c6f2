//! Transaction construction and submission

pub mod builder;
pub mod sender;

pub use builder::{Intent, RouterCodec, TxBuilder, CHAIN_ID};
pub use sender::{TxSender, TxStatus};
