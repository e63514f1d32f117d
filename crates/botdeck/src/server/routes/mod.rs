//! API routes for the platform server

pub mod admin;
pub mod auth;
pub mod chat;
pub mod files;
pub mod projects;
pub mod prompts;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::Project;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/create-admin", post(auth::create_admin))
        // Projects
        .route("/projects", get(projects::list_projects))
        .route("/projects", post(projects::create_project))
        .route("/projects/:id", get(projects::get_project))
        .route("/projects/:id", put(projects::update_project))
        .route("/projects/:id", delete(projects::delete_project))
        // Prompt snippets
        .route("/prompts/project/:project_id", get(prompts::list_prompts))
        .route("/prompts/project/:project_id", post(prompts::create_prompt))
        .route("/prompts/:id", put(prompts::update_prompt))
        .route("/prompts/:id", delete(prompts::delete_prompt))
        // Chat
        .route(
            "/chat/project/:project_id/conversations",
            get(chat::list_conversations),
        )
        .route(
            "/chat/conversations/:conversation_id/messages",
            get(chat::list_messages),
        )
        .route("/chat/project/:project_id/send", post(chat::send_message))
        .route("/chat/project/:project_id/stream", post(chat::stream_message))
        .route(
            "/chat/conversations/:conversation_id",
            delete(chat::delete_conversation),
        )
        .route("/chat/models", get(chat::list_models))
        // Files - with a body limit sized to the upload ceiling
        .route("/files/project/:project_id", get(files::list_files))
        .route(
            "/files/project/:project_id",
            post(files::upload_file).layer(DefaultBodyLimit::max(max_upload_size + 64 * 1024)),
        )
        .route("/files/:id/download", get(files::download_file))
        .route("/files/:id", delete(files::delete_file))
        // Admin
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route(
            "/admin/users/:id/reset-password",
            put(admin::reset_password),
        )
        // Health (mirrored at the root as well)
        .route("/health", get(super::health))
}

/// Fetch a project scoped to its owner; a miss (absent or foreign) is a 404,
/// never a 403, so existence is not leaked across tenants.
pub(crate) fn owned_project(state: &AppState, user_id: &Uuid, project_id: &Uuid) -> Result<Project> {
    state
        .db()
        .get_project_owned(project_id, user_id)?
        .ok_or(Error::NotFound("Project"))
}
