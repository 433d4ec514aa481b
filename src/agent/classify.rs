//! Lightweight keyword classification of user input.
//!
//! Natural-language understanding lives in the backend; the runtime only
//! decides which endpoint a command goes to and whether a free-text reply is
//! a confirmation.

/// Which backend path a fresh command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Swap,
    Dca,
    General,
}

/// How a free-text reply reads in a confirmation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Affirmative,
    Negative,
    Other,
}

const AFFIRMATIVE_TOKENS: &[&str] = &["yes", "y", "yeah", "yep", "ok", "okay", "sure", "confirm"];

const NEGATIVE_TOKENS: &[&str] = &["no", "n", "nope", "cancel", "abort", "stop"];

pub fn classify_command(text: &str) -> CommandKind {
    let normalized = text.trim().to_lowercase();
    if normalized.starts_with("swap ") {
        CommandKind::Swap
    } else if normalized.starts_with("dca ") || normalized.starts_with("dollar cost average ") {
        CommandKind::Dca
    } else {
        CommandKind::General
    }
}

/// Exact-token match, case-insensitive and trimmed. Anything else is `Other`
/// and falls through to fresh-command dispatch.
pub fn classify_reply(text: &str) -> ReplyKind {
    let normalized = text.trim().to_lowercase();
    if AFFIRMATIVE_TOKENS.contains(&normalized.as_str()) {
        ReplyKind::Affirmative
    } else if NEGATIVE_TOKENS.contains(&normalized.as_str()) {
        ReplyKind::Negative
    } else {
        ReplyKind::Other
    }
}
