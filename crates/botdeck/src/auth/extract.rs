//! Request extractors for authenticated and admin callers

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use uuid::Uuid;

use crate::auth::token;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Role, User};

/// The authenticated caller, resolved from the bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// An authenticated caller whose admin role has been re-checked against the
/// database (tokens outlive demotions)
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| Error::Unauthorized("Authorization token required".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts)?;
        let claims = token::verify(&state.config().auth.jwt_secret, token)?;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(AuthUser {
            id,
            role: Role::from_str(&claims.role),
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let user = state
            .db()
            .get_user(&auth.id)?
            .filter(|u| u.role == Role::Admin)
            .ok_or_else(|| {
                Error::Forbidden("Access denied: Admin privileges required".to_string())
            })?;

        Ok(AdminUser { user })
    }
}
