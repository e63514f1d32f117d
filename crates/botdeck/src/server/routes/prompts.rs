//! Prompt snippet endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::server::routes::owned_project;
use crate::server::state::AppState;
use crate::types::Prompt;

#[derive(Debug, Deserialize)]
pub struct CreatePromptRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromptRequest {
    pub name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromptListResponse {
    pub prompts: Vec<Prompt>,
}

#[derive(Debug, Serialize)]
pub struct DeletePromptResponse {
    pub message: String,
}

/// Resolve a prompt through its owning project; a broken chain reads as a
/// missing prompt.
fn owned_prompt(state: &AppState, user_id: &Uuid, prompt_id: &Uuid) -> Result<Prompt> {
    let prompt = state
        .db()
        .get_prompt(prompt_id)?
        .ok_or(Error::NotFound("Prompt"))?;

    state
        .db()
        .get_project_owned(&prompt.project_id, user_id)?
        .ok_or(Error::NotFound("Prompt"))?;

    Ok(prompt)
}

/// GET /api/prompts/project/:project_id - A project's prompt snippets
pub async fn list_prompts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<PromptListResponse>> {
    let project = owned_project(&state, &auth.id, &project_id)?;
    let prompts = state.db().list_prompts_for_project(&project.id)?;

    Ok(Json(PromptListResponse { prompts }))
}

/// POST /api/prompts/project/:project_id - Create a prompt snippet
pub async fn create_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(request): Json<CreatePromptRequest>,
) -> Result<(StatusCode, Json<Prompt>)> {
    if request.name.trim().is_empty() {
        return Err(Error::validation("name", "Prompt name is required"));
    }
    if request.content.trim().is_empty() {
        return Err(Error::validation("content", "Prompt content is required"));
    }

    let project = owned_project(&state, &auth.id, &project_id)?;

    let prompt = Prompt::new(request.name, request.content, project.id);
    state.db().insert_prompt(&prompt)?;

    Ok((StatusCode::CREATED, Json(prompt)))
}

/// PUT /api/prompts/:id - Partial update
pub async fn update_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePromptRequest>,
) -> Result<Json<Prompt>> {
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return Err(Error::validation("name", "Prompt name cannot be empty"));
        }
    }
    if let Some(content) = &request.content {
        if content.trim().is_empty() {
            return Err(Error::validation("content", "Prompt content cannot be empty"));
        }
    }

    let prompt = owned_prompt(&state, &auth.id, &id)?;

    let updated = state
        .db()
        .update_prompt(&prompt.id, request.name.as_deref(), request.content.as_deref())?
        .ok_or(Error::NotFound("Prompt"))?;

    Ok(Json(updated))
}

/// DELETE /api/prompts/:id
pub async fn delete_prompt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletePromptResponse>> {
    let prompt = owned_prompt(&state, &auth.id, &id)?;

    state.db().delete_prompt(&prompt.id)?;

    Ok(Json(DeletePromptResponse {
        message: "Prompt deleted successfully".to_string(),
    }))
}
