//! Project CRUD endpoints

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
use crate::storage::ProjectChanges;
use crate::types::{Conversation, Project, ProjectCounts, ProjectSummary, Prompt};

/// Conversations included inline on the project detail view
const RECENT_CONVERSATIONS: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
}

/// A project with its prompts and recent conversations inlined
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub prompts: Vec<Prompt>,
    pub conversations: Vec<Conversation>,
    pub counts: ProjectCounts,
}

#[derive(Debug, Serialize)]
pub struct DeleteProjectResponse {
    pub message: String,
}

/// GET /api/projects - The caller's projects with child counts
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProjectListResponse>> {
    let projects = state.db().list_projects_for_user(&auth.id)?;

    let mut summaries = Vec::with_capacity(projects.len());
    for project in projects {
        let counts = state.db().project_counts(&project.id)?;
        summaries.push(ProjectSummary { project, counts });
    }

    Ok(Json(ProjectListResponse { projects: summaries }))
}

/// POST /api/projects - Create a project
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    if request.name.trim().is_empty() {
        return Err(Error::validation("name", "Project name is required"));
    }

    let project = Project::new(
        request.name,
        request.description,
        request.system_prompt,
        request.model,
        auth.id,
    );
    state.db().insert_project(&project)?;

    tracing::info!("Created project {} for user {}", project.id, auth.id);

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/:id - A single project with prompts and recent
/// conversations
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectDetail>> {
    let project = owned_project(&state, &auth.id, &id)?;

    let prompts = state.db().list_prompts_for_project(&project.id)?;
    let conversations = state
        .db()
        .recent_conversations_for_project(&project.id, RECENT_CONVERSATIONS)?;
    let counts = state.db().project_counts(&project.id)?;

    Ok(Json(ProjectDetail {
        project,
        prompts,
        conversations,
        counts,
    }))
}

/// PUT /api/projects/:id - Partial update
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<Project>> {
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return Err(Error::validation("name", "Project name cannot be empty"));
        }
    }

    let changes = ProjectChanges {
        name: request.name,
        description: request.description,
        system_prompt: request.system_prompt,
        model: request.model,
    };

    let project = state
        .db()
        .update_project(&id, &auth.id, &changes)?
        .ok_or(Error::NotFound("Project"))?;

    Ok(Json(project))
}

/// DELETE /api/projects/:id - Delete a project and every descendant
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteProjectResponse>> {
    let project = owned_project(&state, &auth.id, &id)?;

    let stored_names = state.db().delete_project_cascade(&project.id)?;
    state.uploads().remove_all(&stored_names).await;

    tracing::info!(
        "Deleted project {} ({} uploaded files removed)",
        project.id,
        stored_names.len()
    );

    Ok(Json(DeleteProjectResponse {
        message: "Project deleted successfully".to_string(),
    }))
}
