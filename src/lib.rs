//! swapsmith: a natural-language DeFi command runtime.
//!
//! Users type requests like "swap 0.1 ETH for USDC" into a chat surface (web
//! or Telegram). Understanding, token resolution and routing are delegated to
//! an external command backend; this crate owns everything around that call:
//! the conversation log, the yes/no confirmation state machine, the
//! approve-then-swap transaction executor, the chain registry and the wallet
//! bridge handshake.

pub mod agent;
pub mod api;
pub mod bridge;
pub mod chains;
pub mod channels;
pub mod config;
pub mod error;
pub mod executor;
pub mod session;

pub use error::{Error, Result};
