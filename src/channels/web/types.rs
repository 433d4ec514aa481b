//! Request and response DTOs for the web gateway API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::TurnOutcome;
use crate::session::Response;

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Caller-supplied key forwarded to the backend for this request only.
    #[serde(default)]
    pub openai_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub outcome: &'static str,
    /// Entries appended to the log by this turn, in order.
    pub entries: Vec<Response>,
}

/// Body of `POST /api/chat/select-quote`.
#[derive(Debug, Deserialize)]
pub struct SelectQuoteRequest {
    #[serde(default)]
    pub creator_id: Option<String>,
    pub entry_id: Uuid,
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub creator_id: String,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// The UI disables its input while a turn is in flight.
    pub is_loading: bool,
    pub entries: Vec<Response>,
}

/// Body of `POST /api/chain` (chain-switch notification from the wallet).
#[derive(Debug, Deserialize)]
pub struct ChainSwitchRequest {
    #[serde(default)]
    pub creator_id: Option<String>,
    pub chain_id: u64,
}

#[derive(Debug, Serialize)]
pub struct ChainSwitchResponse {
    pub chain_id: u64,
    pub supported: bool,
    pub entries: Vec<Response>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) fn outcome_label(outcome: TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Dispatched => "dispatched",
        TurnOutcome::AwaitingConfirmation => "awaiting_confirmation",
        TurnOutcome::QuotesOffered => "quotes_offered",
        TurnOutcome::Executed => "executed",
        TurnOutcome::Cancelled => "cancelled",
        TurnOutcome::Errored => "errored",
    }
}
