//! Turn pipeline: confirmation state machine + command dispatch.
//!
//! Every user utterance enters through [`Pipeline::handle_input`]. If an
//! earlier entry is still awaiting confirmation, the reply is interpreted as
//! yes/no/other; otherwise (and for anything unrecognized) the text is
//! dispatched to the backend as a fresh command. All failures terminate as
//! `status = error` log entries; nothing propagates past the pipeline.

mod classify;

pub use classify::{CommandKind, ReplyKind, classify_command, classify_reply};

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::api::{
    AgentType, CommandBackend, CommandReply, CommandRequest, ResponseBody, StructuredContent,
    TransactionDescriptor,
};
use crate::error::SessionError;
use crate::executor::{ExecutorEvent, TransactionExecutor, WalletProvider};
use crate::session::{Response, ResponseStatus, Session};

const GENERIC_ERROR_TEXT: &str =
    "Sorry, something went wrong while processing your command. Please try again.";

const CANCEL_ACK_TEXT: &str = "Operation cancelled. Let me know if you need anything else.";

const NO_WALLET_TEXT: &str = "Connect a wallet first, then re-issue the command.";

/// Terminal per-turn outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Dispatched,
    AwaitingConfirmation,
    QuotesOffered,
    Executed,
    Cancelled,
    Errored,
}

/// Stateless driver over a [`Session`]: owns the backend and wallet provider
/// handles, never the conversation state itself.
pub struct Pipeline {
    backend: Arc<dyn CommandBackend>,
    provider: Arc<dyn WalletProvider>,
}

fn is_brian_style(entry: &Response) -> bool {
    entry.agent_type == Some(AgentType::Brian)
        || matches!(
            entry.content.structured(),
            Some(StructuredContent::BrianConfirmation { .. })
                | Some(StructuredContent::Transaction { .. })
        )
}

impl Pipeline {
    pub fn new(backend: Arc<dyn CommandBackend>, provider: Arc<dyn WalletProvider>) -> Self {
        Self { backend, provider }
    }

    /// Process one user utterance against a session.
    pub async fn handle_input(&self, session: &mut Session, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            return TurnOutcome::Dispatched;
        }

        session.set_loading(true);
        let outcome = self.handle_input_inner(session, text).await;
        session.set_loading(false);
        outcome
    }

    async fn handle_input_inner(&self, session: &mut Session, text: &str) -> TurnOutcome {
        match classify_reply(text) {
            // Cancellation never touches the backend. A repeated "no" with
            // nothing awaiting is a pure no-op, so cancelling is idempotent.
            ReplyKind::Negative => {
                if session.any_awaiting_confirmation() {
                    session.push(Response::command(text));
                    session.clear_awaiting_confirmation();
                    session.push(Response::message(CANCEL_ACK_TEXT, ResponseStatus::Success));
                }
                TurnOutcome::Cancelled
            }
            ReplyKind::Affirmative if session.any_awaiting_confirmation() => {
                self.handle_affirmative(session, text).await
            }
            // Anything else while awaiting confirmation abandons the pending
            // confirmation and is treated as a brand-new command.
            _ => self.dispatch_fresh(session, text).await,
        }
    }

    async fn handle_affirmative(&self, session: &mut Session, text: &str) -> TurnOutcome {
        let (context_id, brian_style) = match session.last_contextual_entry() {
            Some(entry) => (Some(entry.id), is_brian_style(entry)),
            None => (None, false),
        };

        let mut echo = Response::command(text);
        if let Some(id) = context_id {
            echo = echo.with_context(id);
        }
        session.push(echo);
        session.clear_awaiting_confirmation();

        if brian_style {
            self.confirm_brian(session, context_id).await
        } else {
            self.offer_quotes(session, context_id).await
        }
    }

    /// Brian-style confirmations replay a literal "yes" through the general
    /// endpoint; any returned transaction is executed immediately.
    async fn confirm_brian(&self, session: &mut Session, context_id: Option<Uuid>) -> TurnOutcome {
        let request = self.request_for(session, "yes");
        let reply = match self.backend.process_command(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "brian confirmation failed");
                session.push(Self::contextual_error(GENERIC_ERROR_TEXT, context_id));
                return TurnOutcome::Errored;
            }
        };

        if let Some(domain) = reply.error {
            session.push(Self::contextual_error(domain, context_id));
            return TurnOutcome::Errored;
        }

        let awaiting = reply.awaits_confirmation();
        self.push_reply_entry(session, &reply, context_id);

        if let Some(descriptor) = reply.transaction {
            return self.execute_descriptor(session, descriptor, context_id).await;
        }
        if awaiting {
            TurnOutcome::AwaitingConfirmation
        } else {
            TurnOutcome::Dispatched
        }
    }

    /// Plain-swap confirmations fetch candidate routes for the user to pick
    /// from. A backend `is_brian_operation` flag reroutes to the Brian path
    /// (the original confirmation was misclassified).
    async fn offer_quotes(&self, session: &mut Session, context_id: Option<Uuid>) -> TurnOutcome {
        let Some(wallet) = session.wallet_address().map(str::to_string) else {
            session.push(Self::contextual_error(NO_WALLET_TEXT, context_id));
            return TurnOutcome::Errored;
        };

        let sheet = match self
            .backend
            .get_swap_quotes(&wallet, session.chain_id())
            .await
        {
            Ok(sheet) => sheet,
            Err(err) => {
                warn!(error = %err, "quote fetch failed");
                session.push(Self::contextual_error(GENERIC_ERROR_TEXT, context_id));
                return TurnOutcome::Errored;
            }
        };

        if let Some(domain) = sheet.error {
            session.push(Self::contextual_error(domain, context_id));
            return TurnOutcome::Errored;
        }
        if sheet.is_brian_operation {
            return self.confirm_brian(session, context_id).await;
        }
        if sheet.quotes.is_empty() {
            session.push(Self::contextual_error(
                "No swap routes are available right now.",
                context_id,
            ));
            return TurnOutcome::Errored;
        }

        let mut entry = Response::agent(
            ResponseBody::Structured(StructuredContent::QuoteSelection {
                requires_selection: true,
                quotes: sheet.quotes,
                token_out: sheet.token_out,
            }),
            ResponseStatus::Success,
        )
        .with_agent_type(AgentType::Swap);
        if let Some(id) = context_id {
            entry = entry.with_context(id);
        }
        session.push(entry);
        TurnOutcome::QuotesOffered
    }

    async fn dispatch_fresh(&self, session: &mut Session, text: &str) -> TurnOutcome {
        let context_id = session.push(Response::command(text));
        let request = self.request_for(session, text);

        let reply = match classify_command(text) {
            CommandKind::Swap => self.backend.process_swap_command(&request).await,
            CommandKind::Dca => self.backend.process_dca_command(&request).await,
            CommandKind::General => self.backend.process_command(&request).await,
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, command = text, "command dispatch failed");
                session.push(Self::contextual_error(GENERIC_ERROR_TEXT, Some(context_id)));
                return TurnOutcome::Errored;
            }
        };

        if let Some(domain) = reply.error {
            session.push(Self::contextual_error(domain, Some(context_id)));
            return TurnOutcome::Errored;
        }

        // A new command supersedes any confirmation still pending.
        session.clear_awaiting_confirmation();

        let awaiting = reply.awaits_confirmation();
        self.push_reply_entry(session, &reply, Some(context_id));

        if let Some(descriptor) = reply.transaction {
            return self
                .execute_descriptor(session, descriptor, Some(context_id))
                .await;
        }
        if awaiting {
            TurnOutcome::AwaitingConfirmation
        } else {
            TurnOutcome::Dispatched
        }
    }

    /// Quote selection is a distinct user action (not free text). Misuse of
    /// the API surface (unknown entry, bad index) is returned to the channel;
    /// execution failures become log entries as usual.
    pub async fn select_quote(
        &self,
        session: &mut Session,
        entry_id: Uuid,
        index: usize,
    ) -> Result<TurnOutcome, SessionError> {
        let quotes = session.quotes_for(entry_id)?;
        let quote = quotes
            .get(index)
            .cloned()
            .ok_or(SessionError::QuoteOutOfRange {
                index,
                available: quotes.len(),
            })?;
        let wallet = session
            .wallet_address()
            .ok_or(SessionError::NoWallet)?
            .to_string();

        session.set_loading(true);
        session.push(
            Response::message(
                format!("Executing swap via {}...", quote.protocol),
                ResponseStatus::Processing,
            )
            .with_agent_type(AgentType::Swap)
            .with_context(entry_id),
        );

        let outcome = match self
            .backend
            .execute_swap(&wallet, session.chain_id(), &quote)
            .await
        {
            Ok(descriptor) => {
                self.execute_descriptor(session, descriptor, Some(entry_id))
                    .await
            }
            Err(err) => {
                warn!(error = %err, "swap execution request failed");
                session.push(Self::contextual_error(GENERIC_ERROR_TEXT, Some(entry_id)));
                TurnOutcome::Errored
            }
        };
        session.set_loading(false);
        Ok(outcome)
    }

    async fn execute_descriptor(
        &self,
        session: &mut Session,
        descriptor: TransactionDescriptor,
        context_id: Option<Uuid>,
    ) -> TurnOutcome {
        let Some(wallet) = session.wallet_address().map(str::to_string) else {
            session.push(Self::contextual_error(NO_WALLET_TEXT, context_id));
            return TurnOutcome::Errored;
        };

        let executor = TransactionExecutor::new(self.provider.as_ref(), self.backend.as_ref());
        let mut submitted_entry: Option<Uuid> = None;

        let result = {
            let session = &mut *session;
            let submitted_entry = &mut submitted_entry;
            let mut on_event = move |event: ExecutorEvent| {
                let entry = match &event {
                    ExecutorEvent::Approving { token, .. } => Response::message(
                        format!("Approving {token} for trading..."),
                        ResponseStatus::Processing,
                    ),
                    ExecutorEvent::Approved { .. } => {
                        Response::message("Approval confirmed.", ResponseStatus::Success)
                    }
                    ExecutorEvent::Refetching => Response::message(
                        "Rebuilding the transaction with fresh route data...",
                        ResponseStatus::Processing,
                    ),
                    ExecutorEvent::Submitted { explorer_url, .. } => Response::message(
                        format!("Transaction submitted. Track it here: {explorer_url}"),
                        ResponseStatus::Processing,
                    ),
                };
                let entry = match context_id {
                    Some(id) => entry.with_context(id),
                    None => entry,
                };
                let pushed = session.push(entry);
                if matches!(event, ExecutorEvent::Submitted { .. }) {
                    *submitted_entry = Some(pushed);
                }
            };
            executor.execute(descriptor, &wallet, &mut on_event).await
        };

        match result {
            Ok(outcome) => {
                let text = format!(
                    "Transaction confirmed! View it here: {}",
                    outcome.explorer_url
                );
                match submitted_entry {
                    Some(id) => {
                        let _ = session.replace(
                            id,
                            ResponseBody::text(text),
                            ResponseStatus::Success,
                        );
                    }
                    None => {
                        session.push(Response::message(text, ResponseStatus::Success));
                    }
                }
                TurnOutcome::Executed
            }
            Err(err) => {
                let text = err.user_message();
                match submitted_entry {
                    Some(id) => {
                        let _ = session.replace(
                            id,
                            ResponseBody::text(text),
                            ResponseStatus::Error,
                        );
                    }
                    None => {
                        session.push(Self::contextual_error(text, context_id));
                    }
                }
                TurnOutcome::Errored
            }
        }
    }

    fn request_for(&self, session: &Session, content: &str) -> CommandRequest {
        CommandRequest {
            content: content.to_string(),
            creator_id: session.creator_id().to_string(),
            chain_id: Some(session.chain_id()),
            creator_name: session.display_name().map(str::to_string),
        }
    }

    fn push_reply_entry(
        &self,
        session: &mut Session,
        reply: &CommandReply,
        context_id: Option<Uuid>,
    ) {
        let Some(content) = reply.content.clone() else {
            return;
        };
        let mut entry = Response::agent(content, ResponseStatus::Success)
            .with_metadata(reply.metadata.clone())
            .with_pending_command(reply.pending_command.clone())
            .with_awaiting_confirmation(reply.awaits_confirmation());
        if let Some(agent_type) = reply.agent_type {
            entry = entry.with_agent_type(agent_type);
        }
        if let Some(id) = context_id {
            entry = entry.with_context(id);
        }
        session.push(entry);
    }

    fn contextual_error(text: impl Into<String>, context_id: Option<Uuid>) -> Response {
        let entry = Response::error(text);
        match context_id {
            Some(id) => entry.with_context(id),
            None => entry,
        }
    }
}
