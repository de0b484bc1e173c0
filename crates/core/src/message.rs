//! Message and session domain types.
//!
//! A [`Message`] is what travels to the completion provider; a
//! [`SessionId`] correlates the turns of one visitor's conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque correlation key for a conversation (session).
///
/// Either supplied by the caller or generated by the server and returned so
/// later requests can continue the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the caller's id when it carries any content, otherwise mint one.
    pub fn resolve(provided: Option<&str>) -> Self {
        match provided.map(str::trim) {
            Some(s) if !s.is_empty() => Self(s.to_string()),
            _ => Self::new(),
        }
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The site visitor
    User,
    /// The model
    Assistant,
    /// Instructions (the composed prompt)
    System,
}

/// A single message sent to or received from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::system("You answer questions about the portfolio");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"system\""));
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.content, msg.content);
    }

    #[test]
    fn session_id_keeps_caller_value() {
        let id = SessionId::resolve(Some("visitor-42"));
        assert_eq!(id.as_str(), "visitor-42");
    }

    #[test]
    fn session_id_generated_when_missing_or_blank() {
        let a = SessionId::resolve(None);
        let b = SessionId::resolve(Some("   "));
        assert!(!a.as_str().is_empty());
        assert!(!b.as_str().trim().is_empty());
        assert_ne!(a, b);
    }
}
