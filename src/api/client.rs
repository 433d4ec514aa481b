//! HTTP client for the command backend.
//!
//! All natural-language understanding, token resolution and routing live in
//! the external backend; this client only moves JSON. `CommandBackend` is the
//! seam the session core is tested against.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::types::{CommandReply, CommandRequest, Quote, QuoteSheet, TransactionDescriptor};
use crate::error::ApiError;

/// Header carrying the caller's own OpenAI key, forwarded verbatim.
const OPENAI_KEY_HEADER: &str = "X-OpenAI-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Optional per-user credentials attached to every backend call.
///
/// Missing credentials degrade backend capability; they never fail a call.
#[derive(Debug, Clone, Default)]
pub struct ApiCredentials {
    pub openai_key: Option<SecretString>,
}

/// Operations the session core needs from the backend.
#[async_trait]
pub trait CommandBackend: Send + Sync {
    async fn process_command(&self, request: &CommandRequest) -> Result<CommandReply, ApiError>;

    async fn process_swap_command(
        &self,
        request: &CommandRequest,
    ) -> Result<CommandReply, ApiError>;

    async fn process_dca_command(&self, request: &CommandRequest)
    -> Result<CommandReply, ApiError>;

    async fn get_swap_quotes(
        &self,
        wallet_address: &str,
        chain_id: u64,
    ) -> Result<QuoteSheet, ApiError>;

    async fn execute_swap(
        &self,
        wallet_address: &str,
        chain_id: u64,
        quote: &Quote,
    ) -> Result<TransactionDescriptor, ApiError>;

    /// Re-request a prepared transaction for `command`, typically the
    /// `pending_command` replayed after an approval with `skip_approval` set.
    async fn prepare_transaction(
        &self,
        command: &str,
        wallet_address: &str,
        chain_id: u64,
        skip_approval: bool,
    ) -> Result<TransactionDescriptor, ApiError>;
}

/// reqwest-backed implementation of [`CommandBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    credentials: ApiCredentials,
}

#[derive(Serialize)]
struct QuotesRequest<'a> {
    wallet_address: &'a str,
    chain_id: u64,
}

#[derive(Serialize)]
struct ExecuteSwapRequest<'a> {
    wallet_address: &'a str,
    chain_id: u64,
    quote: &'a Quote,
}

#[derive(Serialize)]
struct PrepareTransactionRequest<'a> {
    command: &'a str,
    wallet_address: &'a str,
    chain_id: u64,
    skip_approval: bool,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, credentials: ApiCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            credentials,
        }
    }

    /// Clone of this backend carrying a caller-supplied key instead of the
    /// configured default.
    pub fn with_openai_key(&self, key: SecretString) -> Self {
        let mut cloned = self.clone();
        cloned.credentials.openai_key = Some(key);
        cloned
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let endpoint = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&endpoint).json(body);
        if let Some(key) = &self.credentials.openai_key {
            request = request.header(OPENAI_KEY_HEADER, key.expose_secret());
        }

        let response = request.send().await.map_err(|e| ApiError::RequestFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::BadStatus {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CommandBackend for HttpBackend {
    async fn process_command(&self, request: &CommandRequest) -> Result<CommandReply, ApiError> {
        self.post("/api/process-command", request).await
    }

    async fn process_swap_command(
        &self,
        request: &CommandRequest,
    ) -> Result<CommandReply, ApiError> {
        self.post("/api/swap/process-command", request).await
    }

    async fn process_dca_command(
        &self,
        request: &CommandRequest,
    ) -> Result<CommandReply, ApiError> {
        self.post("/api/dca/process-command", request).await
    }

    async fn get_swap_quotes(
        &self,
        wallet_address: &str,
        chain_id: u64,
    ) -> Result<QuoteSheet, ApiError> {
        self.post(
            "/api/swap/get-quotes",
            &QuotesRequest {
                wallet_address,
                chain_id,
            },
        )
        .await
    }

    async fn execute_swap(
        &self,
        wallet_address: &str,
        chain_id: u64,
        quote: &Quote,
    ) -> Result<TransactionDescriptor, ApiError> {
        self.post(
            "/api/swap/execute",
            &ExecuteSwapRequest {
                wallet_address,
                chain_id,
                quote,
            },
        )
        .await
    }

    async fn prepare_transaction(
        &self,
        command: &str,
        wallet_address: &str,
        chain_id: u64,
        skip_approval: bool,
    ) -> Result<TransactionDescriptor, ApiError> {
        self.post(
            "/api/execute-transaction",
            &PrepareTransactionRequest {
                command,
                wallet_address,
                chain_id,
                skip_approval,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpBackend::new("http://localhost:8000/", ApiCredentials::default());
        assert_eq!(backend.base_url, "http://localhost:8000");
    }

    #[test]
    fn user_key_override_does_not_touch_the_original() {
        let backend = HttpBackend::new("http://localhost:8000", ApiCredentials::default());
        let with_key = backend.with_openai_key(SecretString::from("sk-user"));
        assert!(backend.credentials.openai_key.is_none());
        assert!(with_key.credentials.openai_key.is_some());
    }
}
