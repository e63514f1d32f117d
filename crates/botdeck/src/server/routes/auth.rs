//! Registration, login and account endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{password, token, AuthUser};
use crate::error::{Error, FieldError, Result};
use crate::server::state::AppState;
use crate::types::{Role, User, UserResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub secret_key: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: UserResponse,
    pub project_count: usize,
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn validate_account_fields(email: &str, password: &str, name: &str) -> Result<()> {
    let mut details = Vec::new();

    if !is_valid_email(email) {
        details.push(FieldError::new("email", "Invalid email address"));
    }
    if password.len() < 6 {
        details.push(FieldError::new("password", "Password must be at least 6 characters"));
    }
    if name.trim().chars().count() < 2 {
        details.push(FieldError::new("name", "Name must be at least 2 characters"));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(details))
    }
}

fn register_account(state: &AppState, email: &str, password: &str, name: &str, role: Role) -> Result<AuthResponse> {
    validate_account_fields(email, password, name)?;

    // Pre-check for a friendlier error; the unique index still backstops races.
    if state.db().find_user_by_email(email)?.is_some() {
        return Err(Error::EmailTaken);
    }

    let password_hash = password::hash(password)?;
    let user = User::new(email, password_hash, name, role);
    state.db().insert_user(&user)?;

    let auth = &state.config().auth;
    let token = token::issue(&auth.jwt_secret, &user.id, user.role, auth.token_ttl_secs)?;

    tracing::info!("Registered {} account {}", role.as_str(), user.id);

    Ok(AuthResponse {
        user: UserResponse::from(&user),
        token,
    })
}

/// POST /api/auth/register - Create a user account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    // Role is always `user` here, regardless of anything in the request body
    let response = register_account(&state, &request.email, &request.password, &request.name, Role::User)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login - Authenticate and issue a token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let mut details = Vec::new();
    if !is_valid_email(&request.email) {
        details.push(FieldError::new("email", "Invalid email address"));
    }
    if request.password.is_empty() {
        details.push(FieldError::new("password", "Password is required"));
    }
    if !details.is_empty() {
        return Err(Error::Validation(details));
    }

    // The same message for an unknown email and a wrong password
    let rejected = || Error::Unauthorized("Invalid email or password".to_string());

    let user = state
        .db()
        .find_user_by_email(&request.email)?
        .ok_or_else(rejected)?;

    if !password::verify(&request.password, &user.password_hash) {
        return Err(rejected());
    }

    let auth = &state.config().auth;
    let token = token::issue(&auth.jwt_secret, &user.id, user.role, auth.token_ttl_secs)?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        token,
    }))
}

/// GET /api/auth/me - The authenticated account
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>> {
    let user = state.db().get_user(&auth.id)?.ok_or(Error::NotFound("User"))?;
    let project_count = state.db().count_projects_for_user(&user.id)?;

    Ok(Json(MeResponse {
        user: UserResponse::from(&user),
        project_count,
    }))
}

/// POST /api/auth/create-admin - Bootstrap an admin account, gated by a
/// shared secret
pub async fn create_admin(
    State(state): State<AppState>,
    Json(request): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let admin_secret = &state.config().auth.admin_secret;
    if admin_secret.is_empty() || request.secret_key != *admin_secret {
        return Err(Error::Forbidden("Invalid admin secret key".to_string()));
    }

    let response = register_account(&state, &request.email, &request.password, &request.name, Role::Admin)?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email(" user@example.com "));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.com"));
    }

    #[test]
    fn account_field_validation_collects_all_failures() {
        let err = validate_account_fields("bad", "123", "x").unwrap_err();
        match err {
            Error::Validation(details) => {
                let fields: Vec<&str> = details.iter().map(|d| d.field).collect();
                assert_eq!(fields, vec!["email", "password", "name"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
