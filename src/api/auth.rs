//! Authentication API endpoints.

use axum::{extract::State, Extension, Json};

use super::{require_text, success, ApiResult};
use crate::auth::{self, AuthUser};
use crate::errors::AppError;
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, Role, User};
use crate::AppState;

/// POST /api/auth/register - Create a new account.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<User> {
    let name = require_text(&request.name, "Name")?;
    let email = require_text(&request.email, "Email")?;
    let password = require_text(&request.password, "Password")?;
    let role = require_text(&request.role, "Role")?;

    let role = Role::from_str(&role)
        .ok_or_else(|| AppError::Validation("Role must be employee, manager or admin".to_string()))?;

    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Validation("User already exists".to_string()));
    }

    let password_hash = auth::hash_password(&password)?;
    let user = state
        .repo
        .create_user(&name, &email, &password_hash, role)
        .await?;

    tracing::info!("Registered user {} ({})", user.email, user.role.as_str());
    success(user)
}

/// POST /api/auth/login - Exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let email = require_text(&request.email, "Email")?;
    let password = require_text(&request.password, "Password")?;

    // Unknown email and wrong password surface the same failure.
    let user = state
        .repo
        .find_user_by_email(email.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if !auth::verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = auth::issue_token(&user, state.config.jwt_secret.as_deref())?;
    success(LoginResponse { token, user })
}

/// GET /api/auth/me - The caller's profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<User> {
    let user = state
        .repo
        .get_user(&auth_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    success(user)
}

/// GET /api/auth/users - List all accounts (admin only).
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<User>> {
    auth_user.require_role(&[Role::Admin])?;

    let users = state.repo.list_users().await?;
    success(users)
}
