//! Web gateway: chat API, session event stream, wallet bridge and the
//! Telegram webhook, served by axum.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use futures::Stream;
use futures::StreamExt;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::Pipeline;
use crate::api::HttpBackend;
use crate::bridge::{BridgeCallback, BridgeStore};
use crate::channels::telegram::{TelegramChannel, TelegramUpdate};
use crate::channels::web::types::{
    ChainSwitchRequest, ChainSwitchResponse, ChatRequest, ChatResponse, ErrorBody, HistoryResponse,
    SelectQuoteRequest, outcome_label,
};
use crate::chains;
use crate::config::GatewayConfig;
use crate::error::{BridgeError, ChannelError, SessionError};
use crate::executor::WalletProvider;
use crate::session::SessionStore;

const BRIDGE_PAGE: &str = include_str!("../../../static/bridge.html");

/// Shared state across all gateway routes.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Set in production; enables per-request credential overrides. Absent
    /// when the pipeline runs against a non-HTTP backend (tests).
    pub http_backend: Option<HttpBackend>,
    pub provider: Arc<dyn WalletProvider>,
    pub sessions: Arc<SessionStore>,
    pub bridge: Arc<BridgeStore>,
    pub telegram: Option<Arc<TelegramChannel>>,
}

impl AppState {
    /// Pipeline for one request. A caller-supplied key swaps the backend
    /// credentials for this request only.
    fn pipeline(&self, openai_key: Option<String>) -> Arc<Pipeline> {
        match (openai_key, &self.http_backend) {
            (Some(key), Some(http_backend)) => Arc::new(Pipeline::new(
                Arc::new(http_backend.with_openai_key(SecretString::from(key))),
                self.provider.clone(),
            )),
            _ => self.pipeline.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/select-quote", post(select_quote))
        .route("/api/chat/history", get(history))
        .route("/api/chain", post(switch_chain))
        .route("/api/events", get(events))
        .route("/bridge", get(bridge_page))
        .route("/api/bridge/callback", post(bridge_callback))
        .route("/api/bridge/{uid}", get(bridge_status))
        .route("/api/telegram/webhook", post(telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the gateway until the process exits.
pub async fn serve(config: &GatewayConfig, state: AppState) -> Result<(), ChannelError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "web".to_string(),
                reason: format!("bind {addr}: {e}"),
            })?;
    info!(%addr, "web gateway listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ChannelError::StartupFailed {
            name: "web".to_string(),
            reason: e.to_string(),
        })
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct CreatorQuery {
    #[serde(default)]
    creator_id: Option<String>,
}

fn creator_or_default(creator_id: Option<String>) -> String {
    creator_id.unwrap_or_else(|| "web".to_string())
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> impl IntoResponse {
    let creator_id = creator_or_default(request.creator_id.clone());
    let session_handle = state.sessions.get_or_create(&creator_id).await;
    let mut session = session_handle.lock().await;

    if let Some(name) = request.display_name.clone() {
        session.set_display_name(Some(name));
    }
    if let Some(wallet) = request.wallet_address.clone()
        && session.wallet_address() != Some(wallet.as_str())
    {
        session.connect_wallet(wallet);
    }
    if let Some(chain_id) = request.chain_id
        && chain_id != session.chain_id()
    {
        session.switch_chain(chain_id);
    }

    let mark = session.len();
    let pipeline = state.pipeline(request.openai_key.clone());
    let outcome = pipeline.handle_input(&mut session, &request.content).await;

    Json(ChatResponse {
        outcome: outcome_label(outcome),
        entries: session.entries_since(mark).to_vec(),
    })
}

async fn select_quote(
    State(state): State<AppState>,
    Json(request): Json<SelectQuoteRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let creator_id = creator_or_default(request.creator_id.clone());
    let session_handle = state.sessions.get_or_create(&creator_id).await;
    let mut session = session_handle.lock().await;

    let mark = session.len();
    let pipeline = state.pipeline(None);
    let outcome = pipeline
        .select_quote(&mut session, request.entry_id, request.index)
        .await
        .map_err(|err| {
            let status = match err {
                SessionError::UnknownEntry(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (
                status,
                Json(ErrorBody {
                    error: err.to_string(),
                }),
            )
        })?;

    Ok(Json(ChatResponse {
        outcome: outcome_label(outcome),
        entries: session.entries_since(mark).to_vec(),
    }))
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<CreatorQuery>,
) -> impl IntoResponse {
    let creator_id = creator_or_default(query.creator_id);
    let session_handle = state.sessions.get_or_create(&creator_id).await;
    let session = session_handle.lock().await;
    Json(HistoryResponse {
        creator_id,
        chain_id: session.chain_id(),
        wallet_address: session.wallet_address().map(str::to_string),
        is_loading: session.is_loading(),
        entries: session.entries().to_vec(),
    })
}

async fn switch_chain(
    State(state): State<AppState>,
    Json(request): Json<ChainSwitchRequest>,
) -> impl IntoResponse {
    let creator_id = creator_or_default(request.creator_id);
    let session_handle = state.sessions.get_or_create(&creator_id).await;
    let mut session = session_handle.lock().await;

    let entries = session.switch_chain(request.chain_id);
    Json(ChainSwitchResponse {
        chain_id: request.chain_id,
        supported: chains::is_supported(request.chain_id),
        entries,
    })
}

async fn events(
    State(state): State<AppState>,
    Query(query): Query<CreatorQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let creator_id = creator_or_default(query.creator_id);
    let session_handle = state.sessions.get_or_create(&creator_id).await;
    let receiver = session_handle.lock().await.subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|event| async move {
        match event {
            Ok(event) => Event::default().json_data(&event).ok().map(Ok),
            // Lagged receivers just skip; the history endpoint backfills.
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn bridge_page() -> impl IntoResponse {
    Html(BRIDGE_PAGE)
}

async fn bridge_status(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    match state.bridge.status(&uid).await {
        Ok(status) => (StatusCode::OK, Json(json!(status))),
        Err(err @ BridgeError::Expired(_)) => (
            StatusCode::GONE,
            Json(json!({ "error": err.to_string() })),
        ),
        Err(err) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        ),
    }
}

async fn bridge_callback(
    State(state): State<AppState>,
    Json(callback): Json<BridgeCallback>,
) -> impl IntoResponse {
    match state.bridge.complete(&callback).await {
        Ok(connection) => {
            let wallet = connection.wallet_address.clone().unwrap_or_default();
            let session_handle = state.sessions.get_or_create(&connection.creator_id).await;
            session_handle.lock().await.connect_wallet(wallet.clone());
            info!(creator_id = %connection.creator_id, "wallet connected via bridge");
            (
                StatusCode::OK,
                Json(json!({ "success": true, "wallet_address": wallet })),
            )
        }
        Err(err) => {
            warn!(error = %err, "bridge callback rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
        }
    }
}

/// Telegram retries on non-2xx, so this handler always acknowledges and only
/// logs failures.
async fn telegram_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(telegram) = state.telegram.clone() else {
        return StatusCode::NOT_FOUND;
    };
    match serde_json::from_value::<TelegramUpdate>(payload) {
        Ok(update) => {
            if let Err(err) = telegram.handle_update(update).await {
                warn!(error = %err, "telegram update failed");
            }
        }
        Err(err) => warn!(error = %err, "unparseable telegram update"),
    }
    StatusCode::OK
}
