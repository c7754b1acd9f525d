//! Session and conversation types.

use crate::catalog::DifficultyLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The welcome seeded when a session opens against the real backend.
pub fn scenario_welcome(title: &str) -> String {
    format!(
        "Welcome to the {} practice session! I'll be playing the role of a prospect. Let's begin!",
        title
    )
}

/// The welcome seeded when the backend could not be reached and the session
/// runs locally instead.
pub const FALLBACK_WELCOME: &str =
    "Hello! I'm your AI practice partner. How can I help you today?";

/// The single assistant reply appended when a chat exchange fails, so every
/// user turn always has a paired response in the log.
pub const FAILED_EXCHANGE_REPLY: &str = "Sorry, there was an error processing your message.";

/// Identifies a practice session.
///
/// Remote ids are assigned by the backend; local ids are synthesized when the
/// backend cannot be reached, from a counter that is monotonic per
/// orchestrator. The two spaces stay distinguishable so telemetry can tell
/// authoritative sessions from degraded ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionId {
    Remote(String),
    Local(u64),
}

impl SessionId {
    pub fn is_local(&self) -> bool {
        matches!(self, SessionId::Local(_))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Remote(id) => write!(f, "{}", id),
            SessionId::Local(n) => write!(f, "local-{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// A bounded, single-active conversation instance bound to one
/// scenario/difficulty pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub scenario_id: String,
    pub difficulty: DifficultyLevel,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry in a session's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}
