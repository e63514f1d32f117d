//! Admin endpoints: platform stats and user management

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{password, AdminUser};
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::PlatformStats;
use crate::types::UserResponse;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserSummary {
    #[serde(flatten)]
    pub user: UserResponse,
    pub project_count: usize,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<AdminUserSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminActionResponse {
    pub message: String,
}

/// GET /api/admin/stats - Totals across all collections
pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<PlatformStats>> {
    Ok(Json(state.db().platform_stats()?))
}

/// GET /api/admin/users - Every account with its project count
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<UserListResponse>> {
    let users = state.db().list_users()?;

    let mut summaries = Vec::with_capacity(users.len());
    for user in users {
        let project_count = state.db().count_projects_for_user(&user.id)?;
        summaries.push(AdminUserSummary {
            user: UserResponse::from(&user),
            project_count,
        });
    }

    Ok(Json(UserListResponse { users: summaries }))
}

/// DELETE /api/admin/users/:id - Delete an account and everything it owns
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminActionResponse>> {
    let target = state.db().get_user(&id)?.ok_or(Error::NotFound("User"))?;

    if target.id == admin.user.id {
        return Err(Error::BadRequest("Cannot delete your own account".to_string()));
    }

    // Cascade every project the same way project deletion does, disk bytes
    // included, then remove the account itself.
    let projects = state.db().list_projects_for_user(&target.id)?;
    let mut stored_names = Vec::new();
    for project in &projects {
        stored_names.extend(state.db().delete_project_cascade(&project.id)?);
    }
    state.uploads().remove_all(&stored_names).await;

    state.db().delete_user(&target.id)?;

    tracing::info!(
        "Admin {} deleted user {} ({} projects)",
        admin.user.id,
        target.id,
        projects.len()
    );

    Ok(Json(AdminActionResponse {
        message: "User deleted successfully".to_string(),
    }))
}

/// PUT /api/admin/users/:id/reset-password - Force a new password
pub async fn reset_password(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<AdminActionResponse>> {
    if request.new_password.len() < 6 {
        return Err(Error::validation(
            "newPassword",
            "Password must be at least 6 characters",
        ));
    }

    let target = state.db().get_user(&id)?.ok_or(Error::NotFound("User"))?;

    let password_hash = password::hash(&request.new_password)?;
    state.db().update_user_password(&target.id, &password_hash)?;

    tracing::info!("Admin {} reset the password of user {}", admin.user.id, target.id);

    Ok(Json(AdminActionResponse {
        message: "Password reset successfully".to_string(),
    }))
}
