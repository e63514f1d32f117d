//! Conversation types

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Maximum characters of the first message used for a conversation title
const TITLE_MAX_CHARS: usize = 50;

/// An ordered thread of messages under a project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: impl Into<String>, project_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            project_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive a title from the first message of a conversation: the first 50
    /// characters, with an ellipsis when truncated.
    pub fn derive_title(first_message: &str) -> String {
        let mut title: String = first_message.chars().take(TITLE_MAX_CHARS).collect();
        if first_message.chars().count() > TITLE_MAX_CHARS {
            title.push_str("...");
        }
        title
    }
}

/// A conversation with its message count, as returned by listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_the_title() {
        assert_eq!(Conversation::derive_title("hello"), "hello");
    }

    #[test]
    fn boundary_message_is_untouched() {
        let message = "x".repeat(50);
        assert_eq!(Conversation::derive_title(&message), message);
    }

    #[test]
    fn long_message_is_truncated_with_ellipsis() {
        let message = "x".repeat(51);
        let title = Conversation::derive_title(&message);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let message = "é".repeat(60);
        let title = Conversation::derive_title(&message);
        assert!(title.starts_with(&"é".repeat(50)));
        assert!(title.ends_with("..."));
    }
}
