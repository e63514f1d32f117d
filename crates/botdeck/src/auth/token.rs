//! HS256 bearer tokens
//!
//! Tokens are standard JWTs assembled by hand: base64url header and claims
//! joined with an HMAC-SHA256 signature over `header.payload`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Role;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Account role at issue time
    pub role: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Issue a token for a user, valid for `ttl_secs`
pub fn issue(secret: &str, user_id: &Uuid, role: Role, ttl_secs: i64) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    let header = URL_SAFE_NO_PAD.encode(HEADER.as_bytes());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{}.{}", header, payload);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid token secret: {}", e)))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Verify a token's signature and expiry, returning its claims
pub fn verify(secret: &str, token: &str) -> Result<Claims> {
    let invalid = || Error::Unauthorized("Invalid or expired token".to_string());

    let mut parts = token.split('.');
    let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(invalid()),
    };

    let signing_input = format!("{}.{}", header, payload);
    let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid token secret: {}", e)))?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature).map_err(|_| invalid())?;

    let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;

    if claims.exp <= Utc::now().timestamp() {
        return Err(invalid());
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue(SECRET, &user_id, Role::Admin, 3600).unwrap();

        let claims = verify(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(SECRET, &Uuid::new_v4(), Role::User, 3600).unwrap();
        assert!(verify("other-secret", &token).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue(SECRET, &Uuid::new_v4(), Role::User, 3600).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();

        let forged_claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: "admin".to_string(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        parts[1] = &forged;

        assert!(verify(SECRET, &parts.join(".")).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(SECRET, &Uuid::new_v4(), Role::User, -10).unwrap();
        assert!(verify(SECRET, &token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify(SECRET, "not-a-token").is_err());
        assert!(verify(SECRET, "a.b.c").is_err());
        assert!(verify(SECRET, "").is_err());
    }
}
