//! Telegram companion channel.
//!
//! Webhook-driven: the gateway receives Bot API updates and hands them here.
//! Slash commands cover wallet connection and discovery; anything else goes
//! through the same turn pipeline as the web chat. Confirmations can be
//! answered with inline buttons, which map onto the exact "yes"/"no" replies
//! the state machine already understands.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Pipeline;
use crate::api::{ResponseBody, StructuredContent, format_base_units};
use crate::bridge::BridgeStore;
use crate::chains;
use crate::error::ChannelError;
use crate::session::{Response, SessionStore};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// --- Update DTOs (Bot API subset) ---

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

/// The Telegram-facing half of the runtime.
pub struct TelegramChannel {
    token: SecretString,
    bot_name: String,
    public_url: String,
    client: reqwest::Client,
    pipeline: Arc<Pipeline>,
    sessions: Arc<SessionStore>,
    bridge: Arc<BridgeStore>,
}

impl TelegramChannel {
    pub fn new(
        token: SecretString,
        bot_name: impl Into<String>,
        public_url: impl Into<String>,
        pipeline: Arc<Pipeline>,
        sessions: Arc<SessionStore>,
        bridge: Arc<BridgeStore>,
    ) -> Self {
        Self {
            token,
            bot_name: bot_name.into(),
            public_url: public_url.into(),
            client: reqwest::Client::new(),
            pipeline,
            sessions,
            bridge,
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Point the Bot API webhook at this gateway.
    pub async fn register_webhook(&self) -> Result<(), ChannelError> {
        let webhook_url = format!("{}/api/telegram/webhook", self.public_url);
        self.call_api("setWebhook", json!({ "url": webhook_url.clone() }))
            .await?;
        info!(url = %webhook_url, "telegram webhook registered");
        Ok(())
    }

    /// Entry point for one webhook update.
    pub async fn handle_update(&self, update: TelegramUpdate) -> Result<(), ChannelError> {
        if let Some(message) = update.message {
            let (Some(user), Some(text)) = (message.from.clone(), message.text.clone()) else {
                return Ok(());
            };
            return self.handle_text(message.chat.id, &user, &text).await;
        }
        if let Some(callback) = update.callback_query {
            return self.handle_callback(callback).await;
        }
        Ok(())
    }

    async fn handle_text(
        &self,
        chat_id: i64,
        user: &TelegramUser,
        text: &str,
    ) -> Result<(), ChannelError> {
        let creator_id = creator_id_for(user);
        if let Some(stripped) = text.strip_prefix('/') {
            let mut parts = stripped.splitn(2, ' ');
            let command = parts.next().unwrap_or_default().to_lowercase();
            // "/cmd@bot_name" forms arrive in groups
            let command = command
                .split('@')
                .next()
                .unwrap_or(command.as_str())
                .to_string();
            let args = parts.next().unwrap_or("").trim().to_string();
            return self
                .handle_command(chat_id, user, &creator_id, &command, &args)
                .await;
        }
        self.run_turn(chat_id, &creator_id, user, text).await
    }

    async fn handle_command(
        &self,
        chat_id: i64,
        user: &TelegramUser,
        creator_id: &str,
        command: &str,
        args: &str,
    ) -> Result<(), ChannelError> {
        match command {
            "start" => {
                let name = user.first_name.as_deref().unwrap_or("there");
                self.send_message(
                    chat_id,
                    format!(
                        "Hi {name}! I turn plain-language commands into on-chain transactions.\n\n\
                         Try: swap 0.1 ETH for USDC\n\n\
                         Use /connect to link a wallet and /help for everything I understand."
                    ),
                    None,
                )
                .await
            }
            "help" => {
                self.send_message(
                    chat_id,
                    "Commands:\n\
                     /connect - link a wallet through the bridge page\n\
                     /networks - list supported chains\n\
                     /swap <amount> <token> for <token> - start a swap\n\n\
                     You can also just type what you want, e.g. \"swap 50 USDC for ETH\". \
                     I will ask for a yes/no confirmation before anything is signed."
                        .to_string(),
                    None,
                )
                .await
            }
            "connect" => {
                let uid = self.bridge.begin(creator_id, &self.bot_name).await;
                let url = self.bridge_url(&uid);
                self.send_message(
                    chat_id,
                    format!(
                        "Open this link, connect your wallet and sign the message:\n{url}\n\n\
                         You will be sent back here once the wallet is linked."
                    ),
                    None,
                )
                .await
            }
            "networks" => {
                self.send_message(
                    chat_id,
                    format!("Supported chains: {}.", chains::supported_chains_summary()),
                    None,
                )
                .await
            }
            "swap" if !args.is_empty() => {
                let command = format!("swap {args}");
                self.run_turn(chat_id, creator_id, user, &command).await
            }
            _ => {
                self.send_message(
                    chat_id,
                    "I don't recognize that command. Try /help.".to_string(),
                    None,
                )
                .await
            }
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) -> Result<(), ChannelError> {
        // Stop the client-side spinner regardless of what the data contains.
        let _ = self
            .call_api(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback.id }),
            )
            .await;

        let Some(chat_id) = callback.message.as_ref().map(|m| m.chat.id) else {
            return Ok(());
        };
        let creator_id = creator_id_for(&callback.from);
        let data = callback.data.unwrap_or_default();

        if data.starts_with("swap_confirm:") {
            return self
                .run_turn(chat_id, &creator_id, &callback.from, "yes")
                .await;
        }
        if data.starts_with("swap_cancel:") {
            return self
                .run_turn(chat_id, &creator_id, &callback.from, "no")
                .await;
        }
        if let Some(rest) = data.strip_prefix("quote:") {
            return self.select_quote(chat_id, &creator_id, rest).await;
        }
        Ok(())
    }

    async fn run_turn(
        &self,
        chat_id: i64,
        creator_id: &str,
        user: &TelegramUser,
        text: &str,
    ) -> Result<(), ChannelError> {
        let session_handle = self.sessions.get_or_create(creator_id).await;
        let mut session = session_handle.lock().await;
        if session.display_name().is_none() {
            session.set_display_name(user.username.clone().or_else(|| user.first_name.clone()));
        }
        let mark = session.len();
        self.pipeline.handle_input(&mut session, text).await;
        let appended = session.entries_since(mark).to_vec();
        drop(session);

        self.deliver_entries(chat_id, &appended).await
    }

    async fn select_quote(
        &self,
        chat_id: i64,
        creator_id: &str,
        data: &str,
    ) -> Result<(), ChannelError> {
        let Some((entry_id, index)) = parse_quote_callback(data) else {
            return self
                .send_message(chat_id, "That quote is no longer valid.".to_string(), None)
                .await;
        };

        let session_handle = self.sessions.get_or_create(creator_id).await;
        let mut session = session_handle.lock().await;
        let mark = session.len();
        let result = self.pipeline.select_quote(&mut session, entry_id, index).await;
        let appended = session.entries_since(mark).to_vec();
        drop(session);

        if let Err(err) = result {
            return self.send_message(chat_id, err.to_string(), None).await;
        }
        self.deliver_entries(chat_id, &appended).await
    }

    async fn deliver_entries(
        &self,
        chat_id: i64,
        entries: &[Response],
    ) -> Result<(), ChannelError> {
        for entry in entries.iter().filter(|entry| !entry.is_command) {
            let text = render_entry(entry);
            if text.is_empty() {
                continue;
            }
            let markup = reply_markup_for(entry);
            self.send_message(chat_id, text, markup).await?;
        }
        Ok(())
    }

    fn bridge_url(&self, uid: &str) -> String {
        build_bridge_url(&self.public_url, uid, &self.bot_name)
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: String,
        reply_markup: Option<Value>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call_api("sendMessage", body).await.map(|_| ())
    }

    async fn call_api(&self, method: &str, body: Value) -> Result<Value, ChannelError> {
        let url = format!(
            "{TELEGRAM_API_BASE}/bot{}/{method}",
            self.token.expose_secret()
        );
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".to_string(),
                reason: e.to_string(),
            })?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown Bot API failure");
            warn!(method, description, "telegram api call failed");
            return Err(ChannelError::SendFailed {
                name: "telegram".to_string(),
                reason: description.to_string(),
            });
        }
        Ok(payload)
    }
}

fn creator_id_for(user: &TelegramUser) -> String {
    format!("tg:{}", user.id)
}

/// Handshake-page link handed out by `/connect`: the page reads `uid`,
/// `botName`, `source` (status poll) and `callback` (POST target) from the
/// query string.
fn build_bridge_url(public_url: &str, uid: &str, bot_name: &str) -> String {
    let source = format!("{public_url}/api/bridge/{uid}");
    let callback = format!("{public_url}/api/bridge/callback");
    format!(
        "{}/bridge?uid={}&botName={}&source={}&callback={}",
        public_url,
        urlencoding::encode(uid),
        urlencoding::encode(bot_name),
        urlencoding::encode(&source),
        urlencoding::encode(&callback),
    )
}

fn parse_quote_callback(data: &str) -> Option<(Uuid, usize)> {
    let (entry, index) = data.split_once(':')?;
    Some((Uuid::parse_str(entry).ok()?, index.parse().ok()?))
}

/// Flatten a log entry to plain Telegram text.
fn render_entry(entry: &Response) -> String {
    let body = match &entry.content {
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Structured(content) => match content {
            StructuredContent::SwapConfirmation {
                amount,
                amount_is_usd,
                token_in,
                token_out,
            } => {
                let amount = if *amount_is_usd {
                    format!("${amount} worth of")
                } else {
                    amount.to_string()
                };
                format!(
                    "Swap {amount} {} for {}? Reply yes to fetch quotes or no to cancel.",
                    token_in.symbol, token_out.symbol
                )
            }
            StructuredContent::BrianConfirmation { message }
            | StructuredContent::Transaction { message }
            | StructuredContent::Message { message } => message.clone(),
            StructuredContent::QuoteSelection {
                quotes, token_out, ..
            } => {
                let decimals = token_out
                    .as_ref()
                    .map(|token| chains::token_decimals(&token.symbol))
                    .unwrap_or(18);
                let symbol = token_out
                    .as_ref()
                    .map(|token| token.symbol.clone())
                    .unwrap_or_default();
                let mut lines = vec!["Pick a route:".to_string()];
                for (i, quote) in quotes.iter().enumerate() {
                    lines.push(format!(
                        "{}. {} -> {} {}",
                        i + 1,
                        quote.protocol,
                        format_base_units(&quote.buy_amount, decimals),
                        symbol
                    ));
                }
                lines.join("\n")
            }
        },
    };
    if matches!(entry.status, crate::session::ResponseStatus::Error) {
        format!("⚠️ {body}")
    } else {
        body
    }
}

/// Inline keyboard for entries the user has to act on.
fn reply_markup_for(entry: &Response) -> Option<Value> {
    if entry.awaiting_confirmation {
        return Some(json!({
            "inline_keyboard": [[
                { "text": "✅ Confirm", "callback_data": format!("swap_confirm:{}", entry.id) },
                { "text": "❌ Cancel", "callback_data": format!("swap_cancel:{}", entry.id) },
            ]]
        }));
    }
    if let Some(StructuredContent::QuoteSelection { quotes, .. }) = entry.content.structured() {
        let buttons: Vec<Value> = quotes
            .iter()
            .enumerate()
            .map(|(i, quote)| {
                json!({
                    "text": format!("{} ({})", i + 1, quote.protocol),
                    "callback_data": format!("quote:{}:{}", entry.id, i),
                })
            })
            .collect();
        return Some(json!({ "inline_keyboard": [buttons] }));
    }
    None
}
