//! Travel policy API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{require_text, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{Policy, PolicyRequest, Role};
use crate::AppState;

/// GET /api/policy - List all policies.
pub async fn list_policies(State(state): State<AppState>) -> ApiResult<Vec<Policy>> {
    let policies = state.repo.list_policies().await?;
    success(policies)
}

/// GET /api/policy/:id - Fetch a single policy.
pub async fn get_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Policy> {
    let policy = state
        .repo
        .get_policy(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Policy {} not found", id)))?;

    success(policy)
}

/// POST /api/policy - Create a policy (admin only).
pub async fn create_policy(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<PolicyRequest>,
) -> ApiResult<Policy> {
    auth_user.require_role(&[Role::Admin])?;

    let name = require_text(&request.name, "Name")?;
    let policy = state.repo.create_policy(&name, &request).await?;

    success(policy)
}

/// PUT /api/policy/:id - Replace a policy's rule documents (admin only).
pub async fn update_policy(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<PolicyRequest>,
) -> ApiResult<Policy> {
    auth_user.require_role(&[Role::Admin])?;

    let policy = state.repo.update_policy(&id, &request).await?;
    success(policy)
}
