//! JSON-RPC [`WalletProvider`] for nodes with wallet-managed accounts
//! (`eth_sendTransaction` + receipt polling).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ProviderError;
use crate::executor::provider::{
    ReceiptStatus, TransactionReceipt, TransactionRequest, WalletProvider,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Provider speaking Ethereum JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcProvider {
    endpoint: String,
    client: reqwest::Client,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

fn parse_hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

impl JsonRpcProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!(method, "rpc call");
        let response: RpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ProviderError::from_message(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        response
            .result
            .ok_or_else(|| ProviderError::from_message(format!("{method}: empty rpc result")))
    }
}

fn rpc_transaction_object(request: &TransactionRequest) -> Value {
    let mut tx = serde_json::Map::new();
    tx.insert("from".to_string(), json!(request.from));
    tx.insert("to".to_string(), json!(request.to));
    tx.insert("data".to_string(), json!(request.data));
    tx.insert("value".to_string(), json!(request.value));
    if let Some(gas) = &request.gas_limit {
        tx.insert("gas".to_string(), json!(gas));
    }
    if let Some(price) = &request.gas_price {
        tx.insert("gasPrice".to_string(), json!(price));
    }
    if let Some(fee) = &request.max_fee_per_gas {
        tx.insert("maxFeePerGas".to_string(), json!(fee));
    }
    if let Some(tip) = &request.max_priority_fee_per_gas {
        tx.insert("maxPriorityFeePerGas".to_string(), json!(tip));
    }
    Value::Object(tx)
}

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<String, ProviderError> {
        let result = self
            .call("eth_sendTransaction", json!([rpc_transaction_object(request)]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::from_message("eth_sendTransaction: non-string hash"))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, ProviderError> {
        // Blocks until the node reports a receipt; callers own any timeout
        // policy.
        loop {
            let result = self
                .call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if result.is_null() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let status = match result.get("status").and_then(Value::as_str) {
                Some("0x1") => ReceiptStatus::Success,
                Some("0x0") => ReceiptStatus::Reverted,
                other => {
                    return Err(ProviderError::from_message(format!(
                        "receipt for {tx_hash} has unrecognized status {other:?}"
                    )));
                }
            };
            let block_number = result
                .get("blockNumber")
                .and_then(Value::as_str)
                .and_then(parse_hex_u64);

            return Ok(TransactionReceipt {
                transaction_hash: tx_hash.to_string(),
                status,
                block_number,
            });
        }
    }

    async fn active_chain_id(&self) -> Result<u64, ProviderError> {
        let result = self.call("eth_chainId", json!([])).await?;
        result
            .as_str()
            .and_then(parse_hex_u64)
            .ok_or_else(|| ProviderError::from_message("eth_chainId: unparseable result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_rpc_object_with_optional_gas_fields() {
        let request = TransactionRequest {
            from: "0xabc".to_string(),
            to: "0xdef".to_string(),
            data: "0x".to_string(),
            value: "0x0".to_string(),
            chain_id: 8453,
            gas_limit: Some("0x186a0".to_string()),
            gas_price: None,
            max_fee_per_gas: Some("0x1".to_string()),
            max_priority_fee_per_gas: None,
        };
        let object = rpc_transaction_object(&request);
        assert_eq!(object["gas"], "0x186a0");
        assert_eq!(object["maxFeePerGas"], "0x1");
        assert!(object.get("gasPrice").is_none());
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_u64("0x2105"), Some(8453));
        assert_eq!(parse_hex_u64("0x0"), Some(0));
        assert_eq!(parse_hex_u64("nope"), None);
    }
}
