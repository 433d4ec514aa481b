//! Per-user conversation state.
//!
//! `Session` owns the ordered response log, the loading flag, and the wallet
//! and chain the user is operating on. It is a plain state object with no
//! rendering or network concerns, so the confirmation machine and executor
//! can be exercised against it directly in tests. Channels observe changes
//! through a broadcast stream of [`SessionEvent`]s.

mod response;

pub use response::{Response, ResponseStatus};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::{Quote, ResponseBody, StructuredContent};
use crate::chains;
use crate::error::SessionError;

const EVENT_CAPACITY: usize = 256;

/// Change notifications emitted by a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    EntryAppended { entry: Response },
    EntryReplaced { entry: Response },
    EntriesDropped { ids: Vec<Uuid> },
    ChainChanged { chain_id: u64 },
    WalletConnected { address: String },
}

/// Conversation state for one user.
pub struct Session {
    creator_id: String,
    display_name: Option<String>,
    wallet_address: Option<String>,
    chain_id: u64,
    entries: Vec<Response>,
    is_loading: bool,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(creator_id: impl Into<String>, chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            creator_id: creator_id.into(),
            display_name: None,
            wallet_address: None,
            chain_id,
            entries: Vec::new(),
            is_loading: false,
            events,
        }
    }

    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn set_display_name(&mut self, name: Option<String>) {
        self.display_name = name;
    }

    pub fn wallet_address(&self) -> Option<&str> {
        self.wallet_address.as_deref()
    }

    pub fn connect_wallet(&mut self, address: impl Into<String>) {
        let address = address.into();
        self.wallet_address = Some(address.clone());
        let _ = self.events.send(SessionEvent::WalletConnected { address });
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn entries(&self) -> &[Response] {
        &self.entries
    }

    /// Number of entries; used by channels to slice off the entries a turn
    /// appended.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_since(&self, mark: usize) -> &[Response] {
        &self.entries[mark.min(self.entries.len())..]
    }

    /// Append an entry and broadcast it. Returns the entry id.
    pub fn push(&mut self, entry: Response) -> Uuid {
        let id = entry.id;
        let _ = self.events.send(SessionEvent::EntryAppended {
            entry: entry.clone(),
        });
        self.entries.push(entry);
        id
    }

    pub fn entry(&self, id: Uuid) -> Option<&Response> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Replace an entry's content and status in place, keeping its id and
    /// creation timestamp.
    pub fn replace(
        &mut self,
        id: Uuid,
        content: ResponseBody,
        status: ResponseStatus,
    ) -> Result<(), SessionError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(SessionError::UnknownEntry(id))?;
        entry.content = content;
        entry.status = status;
        entry.awaiting_confirmation = false;
        let updated = entry.clone();
        let _ = self.events.send(SessionEvent::EntryReplaced { entry: updated });
        Ok(())
    }

    pub fn any_awaiting_confirmation(&self) -> bool {
        self.entries.iter().any(|entry| entry.awaiting_confirmation)
    }

    /// Clear the awaiting flag on every entry (confirmation consumed or
    /// cancelled).
    pub fn clear_awaiting_confirmation(&mut self) {
        for entry in &mut self.entries {
            if entry.awaiting_confirmation {
                entry.awaiting_confirmation = false;
                let _ = self.events.send(SessionEvent::EntryReplaced {
                    entry: entry.clone(),
                });
            }
        }
    }

    /// The most recent agent entry that carries an agent type or typed
    /// content; confirmations resolve against this entry.
    pub fn last_contextual_entry(&self) -> Option<&Response> {
        self.entries.iter().rev().find(|entry| {
            !entry.is_command
                && (entry.agent_type.is_some() || entry.content.structured().is_some())
        })
    }

    /// Quotes carried by a quote-selection entry.
    pub fn quotes_for(&self, id: Uuid) -> Result<&[Quote], SessionError> {
        let entry = self.entry(id).ok_or(SessionError::UnknownEntry(id))?;
        match entry.content.structured() {
            Some(StructuredContent::QuoteSelection { quotes, .. }) => Ok(quotes),
            _ => Err(SessionError::NotSelectable(id)),
        }
    }

    /// Chain-switch notification from the wallet layer.
    ///
    /// Switching to an unsupported chain drops every entry still awaiting
    /// confirmation and appends a warning naming the supported chains, so a
    /// descriptor built for another chain can never be confirmed. Returns the
    /// entries this call appended (the guard also removes entries, so callers
    /// cannot diff the log by length).
    pub fn switch_chain(&mut self, chain_id: u64) -> Vec<Response> {
        self.chain_id = chain_id;
        let _ = self.events.send(SessionEvent::ChainChanged { chain_id });

        if chains::is_supported(chain_id) {
            return Vec::new();
        }

        let dropped: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|entry| entry.awaiting_confirmation)
            .map(|entry| entry.id)
            .collect();
        if !dropped.is_empty() {
            self.entries.retain(|entry| !entry.awaiting_confirmation);
            let _ = self.events.send(SessionEvent::EntriesDropped { ids: dropped });
        }

        let warning = Response::error(format!(
            "Network {} is not supported. Pending confirmations were discarded. Supported chains: {}.",
            chain_id,
            chains::supported_chains_summary()
        ));
        let appended = vec![warning.clone()];
        self.push(warning);
        appended
    }
}

/// Shared registry of per-user sessions, keyed by creator id.
///
/// Web and Telegram users share the same store, so a wallet connected through
/// the bridge is visible to whichever channel the user talks on next.
pub struct SessionStore {
    default_chain_id: u64,
    sessions: tokio::sync::RwLock<std::collections::HashMap<String, std::sync::Arc<tokio::sync::Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(default_chain_id: u64) -> Self {
        Self {
            default_chain_id,
            sessions: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub async fn get_or_create(
        &self,
        creator_id: &str,
    ) -> std::sync::Arc<tokio::sync::Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(creator_id) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(creator_id.to_string())
            .or_insert_with(|| {
                std::sync::Arc::new(tokio::sync::Mutex::new(Session::new(
                    creator_id,
                    self.default_chain_id,
                )))
            })
            .clone()
    }
}
