//! Prompt snippet types

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Supplementary text appended to a project's system prompt at send time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    pub fn new(name: impl Into<String>, content: impl Into<String>, project_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            content: content.into(),
            project_id,
            created_at: now,
            updated_at: now,
        }
    }
}
