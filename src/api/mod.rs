//! REST API module.
//!
//! Contains all API routes and handlers following the frontend contract.

mod auth;
mod esg;
mod expenses;
mod itinerary;
mod policy;
mod reports;
mod risk;
mod safety;
mod travel;

pub use auth::*;
pub use esg::*;
pub use expenses::*;
pub use itinerary::*;
pub use policy::*;
pub use reports::*;
pub use risk::*;
pub use safety::*;
pub use travel::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Extract a required, non-blank text field or fail with a field-level message.
pub(crate) fn require_text(value: &Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}
