//! Chatbot project types

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// System prompt applied to projects created without one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Model applied to projects created without one
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

/// A named chatbot configuration owned by a user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        system_prompt: Option<String>,
        model: Option<String>,
        user_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Child counts reported alongside project listings
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProjectCounts {
    pub prompts: usize,
    pub conversations: usize,
    pub files: usize,
}

/// A project with its child counts, as returned by listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub counts: ProjectCounts,
}
