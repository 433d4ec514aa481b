//! Chat log entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::{AgentType, ResponseBody};

/// Lifecycle status of a log entry.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Processing,
    Success,
    Error,
}

/// One entry in the ordered response log.
///
/// `timestamp` is assigned exactly once at creation. In-place replacement of
/// an entry (the submitted → terminal transition) keeps the original id and
/// timestamp; only content and status change.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub id: Uuid,
    pub content: ResponseBody,
    pub timestamp: DateTime<Utc>,
    pub is_command: bool,
    pub status: ResponseStatus,
    pub awaiting_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_command: Option<String>,
    /// Id of the command entry this one answers or reports on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<Uuid>,
}

impl Response {
    fn new(content: ResponseBody, status: ResponseStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            timestamp: Utc::now(),
            is_command: false,
            status,
            awaiting_confirmation: false,
            agent_type: None,
            metadata: None,
            pending_command: None,
            context_id: None,
        }
    }

    /// A user-authored command echo.
    pub fn command(text: impl Into<String>) -> Self {
        let mut entry = Self::new(ResponseBody::text(text), ResponseStatus::Success);
        entry.is_command = true;
        entry
    }

    /// An agent-authored entry.
    pub fn agent(content: ResponseBody, status: ResponseStatus) -> Self {
        Self::new(content, status)
    }

    /// A plain-text agent message.
    pub fn message(text: impl Into<String>, status: ResponseStatus) -> Self {
        Self::new(ResponseBody::text(text), status)
    }

    /// A terminal error entry.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(ResponseBody::text(text), ResponseStatus::Error)
    }

    pub fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = Some(agent_type);
        self
    }

    pub fn with_awaiting_confirmation(mut self, awaiting: bool) -> Self {
        self.awaiting_confirmation = awaiting;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_pending_command(mut self, pending_command: Option<String>) -> Self {
        self.pending_command = pending_command;
        self
    }

    pub fn with_context(mut self, context_id: Uuid) -> Self {
        self.context_id = Some(context_id);
        self
    }
}
