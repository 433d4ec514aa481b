//! Web gateway channel.

pub mod server;
pub mod types;

pub use server::{AppState, router, serve};
