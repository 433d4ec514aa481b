//! Error types for swapsmith.

use std::sync::OnceLock;

use regex::Regex;

/// Top-level error type for the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Environment variable {0} is not valid unicode")]
    NotUnicode(String),
}

/// Backend API errors (command processing, quotes, transaction preparation).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Backend request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Backend returned {status} for {endpoint}: {body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Backend reported: {0}")]
    Domain(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of a raw wallet/provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFault {
    /// The user declined to sign in their wallet.
    UserRejected,
    /// The account cannot cover value + gas.
    InsufficientFunds,
    /// The node reported an execution revert with a recognizable reason.
    Revert(String),
    /// Anything else, truncated to a bounded human-readable line.
    Unclassified(String),
}

/// Longest message we will surface for an unclassified provider failure.
const PROVIDER_MESSAGE_LIMIT: usize = 200;

fn revert_reason_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)execution reverted(?::\s*|\s+with reason\s+)?['\x22]?([^'\x22\n]*)")
            .expect("static regex compiles")
    })
}

fn truncate_message(raw: &str) -> String {
    let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= PROVIDER_MESSAGE_LIMIT {
        flat
    } else {
        let mut cut = PROVIDER_MESSAGE_LIMIT;
        while !flat.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &flat[..cut])
    }
}

impl ProviderFault {
    /// Pattern-match raw provider error text into the four-way taxonomy.
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        if lowered.contains("user rejected")
            || lowered.contains("user denied")
            || lowered.contains("rejected the request")
            || lowered.contains("action_rejected")
        {
            return Self::UserRejected;
        }
        if lowered.contains("insufficient funds") || lowered.contains("insufficient balance") {
            return Self::InsufficientFunds;
        }
        if let Some(captures) = revert_reason_regex().captures(raw) {
            let reason = captures
                .get(1)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .unwrap_or("no reason given");
            return Self::Revert(truncate_message(reason));
        }
        if lowered.contains("revert") {
            return Self::Revert("no reason given".to_string());
        }
        Self::Unclassified(truncate_message(raw))
    }

    /// Short human-readable line rendered into the chat log.
    pub fn user_message(&self) -> String {
        match self {
            Self::UserRejected => "Transaction was cancelled by user.".to_string(),
            Self::InsufficientFunds => {
                "Insufficient funds to cover this transaction and gas.".to_string()
            }
            Self::Revert(reason) => format!("Transaction reverted on-chain: {reason}"),
            Self::Unclassified(message) => format!("Transaction failed: {message}"),
        }
    }
}

/// Wallet/provider errors, carrying the raw text plus its classification.
#[derive(Debug, thiserror::Error)]
#[error("{raw}")]
pub struct ProviderError {
    pub raw: String,
    pub fault: ProviderFault,
}

impl ProviderError {
    pub fn from_message(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let fault = ProviderFault::classify(&raw);
        Self { raw, fault }
    }

    pub fn user_message(&self) -> String {
        self.fault.user_message()
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_message(err.to_string())
    }
}

/// Transaction executor errors.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Approval transaction failed for token {token}")]
    ApprovalFailed { token: String },

    #[error("Transaction descriptor is invalid: {0}")]
    InvalidDescriptor(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Backend error while refetching transaction: {0}")]
    Refetch(#[from] ApiError),
}

impl ExecutorError {
    /// Human line rendered into the chat log for a failed execution.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(err) => err.user_message(),
            Self::ApprovalFailed { token } => {
                format!("Token approval failed for {token}. The swap was not submitted.")
            }
            Self::InvalidDescriptor(reason) => {
                format!("The prepared transaction was invalid: {reason}")
            }
            Self::Refetch(err) => format!("Could not rebuild the transaction after approval: {err}"),
        }
    }
}

/// Wallet-bridge handshake errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Unknown connection id: {0}")]
    UnknownConnection(String),

    #[error("Connection {0} has expired")]
    Expired(String),

    #[error("Signed message does not reference connection {0}")]
    MessageMismatch(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Recovered signer {recovered} does not match claimed address {claimed}")]
    SignerMismatch { recovered: String, claimed: String },
}

/// Channel-related errors (web gateway, Telegram).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Session/state errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No entry with id {0}")]
    UnknownEntry(uuid::Uuid),

    #[error("Entry {0} does not carry selectable quotes")]
    NotSelectable(uuid::Uuid),

    #[error("Quote index {index} out of range ({available} available)")]
    QuoteOutOfRange { index: usize, available: usize },

    #[error("No wallet is connected")]
    NoWallet,
}

/// Result type alias for the runtime.
pub type Result<T> = std::result::Result<T, Error>;
