//! Inbound chat message.

use chrono::{DateTime, Utc};

/// A single user message delivered by the front end.
///
/// Messages are immutable once created: the pipeline only reads them and
/// drops them when the request completes.
///
/// # Examples
///
/// ```
/// use medchat_rs::core::Message;
///
/// let message = Message::new("진료과를 알려주세요", Some("conv-1".to_string()));
/// assert_eq!(message.text(), "진료과를 알려주세요");
/// assert_eq!(message.conversation_id(), Some("conv-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
    received_at: DateTime<Utc>,
    conversation_id: Option<String>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(text: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self::received_at(text, conversation_id, Utc::now())
    }

    /// Creates a message with an explicit arrival time.
    pub fn received_at(
        text: impl Into<String>,
        conversation_id: Option<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            text: text.into(),
            received_at,
            conversation_id: conversation_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Raw message text as received.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Arrival timestamp.
    #[must_use]
    pub const fn arrived_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Client-supplied conversation identifier, if any.
    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Returns `true` when the text has no visible content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
