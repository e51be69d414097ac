//! ESG tracking API endpoints.

use axum::{extract::State, Extension, Json};

use super::{success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{CreateEsgRequest, EsgRecord};
use crate::AppState;

/// GET /api/esg - All ESG records, latest year first.
pub async fn list_esg_records(State(state): State<AppState>) -> ApiResult<Vec<EsgRecord>> {
    let records = state.repo.list_esg_records().await?;
    success(records)
}

/// POST /api/esg - Add an ESG record.
pub async fn create_esg_record(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Json(request): Json<CreateEsgRequest>,
) -> ApiResult<EsgRecord> {
    let year = request
        .year
        .ok_or_else(|| AppError::Validation("Year is required".to_string()))?;

    let record = state
        .repo
        .create_esg_record(
            request.user_id.as_deref(),
            request.score.unwrap_or(0.0),
            request.compliance_rate.unwrap_or(0.0),
            request.co2_reduction.unwrap_or(0.0),
            request.sustainability_index.unwrap_or(0.0),
            year,
        )
        .await?;

    success(record)
}
