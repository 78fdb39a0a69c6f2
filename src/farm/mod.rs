//! Farming activities
//!
//! Each farm runs strictly sequentially: every transaction's receipt is
//! awaited before the next one begins, which keeps nonce sequencing correct
//! without a dedicated nonce manager.

pub mod ping_pong;
pub mod quick_swap;
pub mod send_native;
