//! Backend API client and wire types.

mod client;
mod types;

pub use client::{ApiCredentials, CommandBackend, HttpBackend};
pub use types::{
    AgentType, CommandReply, CommandRequest, Quote, QuoteSheet, ResponseBody, StructuredContent,
    TokenInfo, TransactionDescriptor, format_base_units,
};
