//! Bearer-token authentication module.
//!
//! Issues and validates signed, time-limited JWTs carrying the subject id,
//! role, and display name. With no signing secret configured the module
//! fails closed: no token can be issued or validated.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Role, User};

/// Token lifetime: seven days, matching the frontends' session expectations.
const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user id.
    pub sub: String,
    /// Access role, checked by route guards.
    pub role: Role,
    /// Display name, denormalized so handlers need no user lookup.
    pub name: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// The authenticated caller, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
    pub name: String,
}

impl AuthUser {
    /// Exact set-membership role check; there is no hierarchy.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You are not authorized to perform this action".to_string(),
            ))
        }
    }
}

/// Hash a password with Argon2id in PHC string format.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            AppError::Internal("Password hashing failed".to_string())
        })
}

/// Verify a plaintext password against a stored PHC-format hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        tracing::error!("Stored password hash is malformed: {}", e);
        AppError::Internal("Stored credentials are invalid".to_string())
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!("Password verification error: {}", e);
            Err(AppError::Internal("Password verification failed".to_string()))
        }
    }
}

/// Issue a signed HS256 token for the given user.
///
/// Errors when no signing secret is configured rather than ever producing
/// an unsigned token.
pub fn issue_token(user: &User, secret: Option<&str>) -> Result<String, AppError> {
    let Some(secret) = secret else {
        tracing::error!("Login attempted with no TRAVEL_JWT_SECRET configured");
        return Err(AppError::Internal(
            "Token signing secret is not configured".to_string(),
        ));
    };

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        name: user.name.clone(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Token encoding failed: {}", e);
        AppError::Internal("Failed to issue token".to_string())
    })
}

/// Validate a bearer token and return the authenticated caller.
///
/// Expired and malformed tokens are not distinguished; both surface as a
/// generic authentication failure.
pub fn authenticate(token: &str, secret: Option<&str>) -> Result<AuthUser, AppError> {
    let Some(secret) = secret else {
        return Err(AppError::Unauthorized(
            "Authentication is not configured".to_string(),
        ));
    };

    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(AuthUser {
        id: data.claims.sub,
        role: data.claims.role,
        name: data.claims.name,
    })
}

/// Bearer authentication layer applied to all protected routes.
///
/// On success the decoded [`AuthUser`] is inserted into request extensions
/// for handlers to extract.
pub async fn bearer_auth_layer(
    secret: Option<String>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let Some(token) = token else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match authenticate(&token, secret.as_deref()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: "user-1".to_string(),
            name: "Avery Chen".to_string(),
            email: "avery@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Employee,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("pw", "not-a-hash").is_err());
    }

    #[test]
    fn test_token_round_trip() {
        let token = issue_token(&test_user(), Some("test-secret")).unwrap();
        let auth = authenticate(&token, Some("test-secret")).unwrap();

        assert_eq!(auth.id, "user-1");
        assert_eq!(auth.role, Role::Employee);
        assert_eq!(auth.name, "Avery Chen");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(&test_user(), Some("test-secret")).unwrap();
        assert!(authenticate(&token, Some("other-secret")).is_err());
    }

    #[test]
    fn test_missing_secret_fails_closed() {
        assert!(issue_token(&test_user(), None).is_err());
        assert!(authenticate("anything", None).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "user-1".to_string(),
            role: Role::Employee,
            name: "Avery Chen".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(authenticate(&token, Some("test-secret")).is_err());
    }

    #[test]
    fn test_require_role_membership() {
        let auth = AuthUser {
            id: "user-1".to_string(),
            role: Role::Manager,
            name: "Avery Chen".to_string(),
        };

        assert!(auth.require_role(&[Role::Admin, Role::Manager]).is_ok());
        assert!(auth.require_role(&[Role::Admin]).is_err());
    }
}
