//! Wire DTOs for the command backend.
//!
//! The backend speaks snake_case JSON; these types are the single place that
//! shape is pinned down. `TransactionDescriptor` is everything the executor
//! needs to submit on-chain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which agent produced (or should handle) a reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    #[default]
    Default,
    Swap,
    Dca,
    Brian,
}

/// Token identity as resolved by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub address: Option<String>,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Structured chat content, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredContent {
    SwapConfirmation {
        amount: Decimal,
        #[serde(default)]
        amount_is_usd: bool,
        token_in: TokenInfo,
        token_out: TokenInfo,
    },
    BrianConfirmation {
        message: String,
    },
    Transaction {
        message: String,
    },
    QuoteSelection {
        requires_selection: bool,
        quotes: Vec<Quote>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_out: Option<TokenInfo>,
    },
    Message {
        message: String,
    },
}

/// Chat entry content: free text or a typed object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseBody {
    Structured(StructuredContent),
    Text(String),
}

impl ResponseBody {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn structured(&self) -> Option<&StructuredContent> {
        match self {
            Self::Structured(content) => Some(content),
            Self::Text(_) => None,
        }
    }
}

/// Body of `POST /api/process-command` and the agent-specific variants.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub content: String,
    pub creator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
}

/// Backend reply to a processed command.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandReply {
    #[serde(default)]
    pub content: Option<ResponseBody>,
    #[serde(default)]
    pub agent_type: Option<AgentType>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub pending_command: Option<String>,
    #[serde(default)]
    pub transaction: Option<TransactionDescriptor>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandReply {
    /// Whether this reply asks the user for a yes/no confirmation.
    pub fn awaits_confirmation(&self) -> bool {
        matches!(
            self.content.as_ref().and_then(ResponseBody::structured),
            Some(StructuredContent::SwapConfirmation { .. })
                | Some(StructuredContent::BrianConfirmation { .. })
        )
    }
}

/// One candidate swap route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    /// Protocol/aggregator identity ("0x", "kyber", ...).
    pub protocol: String,
    /// Input amount in base units.
    pub sell_amount: String,
    /// Expected output amount in base units.
    pub buy_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_usd: Option<String>,
}

/// Reply from the swap-quotes endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct QuoteSheet {
    #[serde(default)]
    pub quotes: Vec<Quote>,
    #[serde(default)]
    pub token_out: Option<TokenInfo>,
    #[serde(default)]
    pub is_brian_operation: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Backend-prepared transaction, ready for the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDescriptor {
    pub to: String,
    pub data: String,
    /// Hex-encoded wei value ("0x0" for token-in swaps).
    pub value: String,
    pub chain_id: u64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default)]
    pub needs_approval: bool,
    #[serde(default)]
    pub token_to_approve: Option<String>,
    #[serde(default)]
    pub spender: Option<String>,
    #[serde(default)]
    pub pending_command: Option<String>,
    #[serde(default)]
    pub skip_approval: bool,
    #[serde(default)]
    pub agent_type: Option<AgentType>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl TransactionDescriptor {
    /// Enforce the descriptor invariant: an approval-gated transaction must
    /// name the token and the spender.
    pub fn validate(&self) -> Result<(), String> {
        if self.to.trim().is_empty() {
            return Err("missing 'to' address".to_string());
        }
        if self.needs_approval {
            if self.token_to_approve.as_deref().unwrap_or("").is_empty() {
                return Err("needs_approval without token_to_approve".to_string());
            }
            if self.spender.as_deref().unwrap_or("").is_empty() {
                return Err("needs_approval without spender".to_string());
            }
        }
        Ok(())
    }

    /// Whether the executor must run the approval leg first.
    pub fn requires_approval(&self) -> bool {
        self.needs_approval
            && !self.skip_approval
            && self.token_to_approve.is_some()
            && self.spender.is_some()
    }
}

/// Render a base-unit integer amount with a decimal point, trimming trailing
/// zeros. Falls back to the raw string when it is not a plain integer.
pub fn format_base_units(raw: &str, decimals: u32) -> String {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    let decimals = decimals as usize;
    let digits = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - raw.len()), raw)
    } else {
        raw.to_string()
    };
    let split = digits.len() - decimals;
    let whole = &digits[..split];
    let frac = digits[split..].trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn swap_confirmation_round_trips_with_type_tag() {
        let content = StructuredContent::SwapConfirmation {
            amount: dec!(0.1),
            amount_is_usd: false,
            token_in: TokenInfo {
                address: Some("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".to_string()),
                symbol: "ETH".to_string(),
                name: None,
                metadata: None,
            },
            token_out: TokenInfo {
                address: Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string()),
                symbol: "USDC".to_string(),
                name: None,
                metadata: None,
            },
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["type"], "swap_confirmation");
        let back: StructuredContent = serde_json::from_value(value).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn response_body_accepts_plain_text() {
        let body: ResponseBody = serde_json::from_value(serde_json::json!("hello")).unwrap();
        assert_eq!(body, ResponseBody::Text("hello".to_string()));
    }

    #[test]
    fn reply_with_swap_confirmation_awaits() {
        let reply: CommandReply = serde_json::from_value(serde_json::json!({
            "content": {
                "type": "swap_confirmation",
                "amount": "0.1",
                "token_in": {"address": null, "symbol": "ETH"},
                "token_out": {"address": null, "symbol": "USDC"}
            },
            "agent_type": "swap"
        }))
        .unwrap();
        assert!(reply.awaits_confirmation());
        assert_eq!(reply.agent_type, Some(AgentType::Swap));
    }

    #[test]
    fn descriptor_invariant_requires_token_and_spender() {
        let descriptor: TransactionDescriptor = serde_json::from_value(serde_json::json!({
            "to": "0x1",
            "data": "0x",
            "value": "0x0",
            "chain_id": 8453,
            "needs_approval": true
        }))
        .unwrap();
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn skip_approval_suppresses_the_approval_leg() {
        let descriptor: TransactionDescriptor = serde_json::from_value(serde_json::json!({
            "to": "0x1",
            "data": "0x",
            "value": "0x0",
            "chain_id": 8453,
            "needs_approval": true,
            "token_to_approve": "0x2",
            "spender": "0x3",
            "skip_approval": true
        }))
        .unwrap();
        assert!(descriptor.validate().is_ok());
        assert!(!descriptor.requires_approval());
    }

    #[test]
    fn base_unit_formatting() {
        assert_eq!(format_base_units("1500000", 6), "1.5");
        assert_eq!(format_base_units("100000000000000000", 18), "0.1");
        assert_eq!(format_base_units("42", 0), "42");
        assert_eq!(format_base_units("not-a-number", 6), "not-a-number");
    }
}
