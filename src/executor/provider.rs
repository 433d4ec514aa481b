//! Wallet provider seam.
//!
//! The executor only ever talks to a [`WalletProvider`]; production uses the
//! JSON-RPC implementation in [`crate::executor::rpc`], tests use in-memory
//! fakes.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;

/// Parameters for one on-chain submission.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    pub data: String,
    /// Hex-encoded wei value.
    pub value: String,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
}

/// Outcome reported by a mined receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Mined transaction receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
}

/// The wallet layer: submits transactions and observes receipts.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Submit a transaction for signing, returning its hash.
    async fn send_transaction(&self, request: &TransactionRequest)
    -> Result<String, ProviderError>;

    /// Block until the receipt for `tx_hash` is observed.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, ProviderError>;

    /// Chain the wallet is currently on.
    async fn active_chain_id(&self) -> Result<u64, ProviderError>;
}
