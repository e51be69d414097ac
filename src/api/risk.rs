//! Risk rating API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{require_text, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::events;
use crate::models::{RiskLevel, RiskRating, Role, UpsertRiskRequest, WeatherSnapshot};
use crate::weather;
use crate::AppState;

/// GET /api/risk - All risk ratings, most recent first.
pub async fn list_risks(State(state): State<AppState>) -> ApiResult<Vec<RiskRating>> {
    let risks = state.repo.list_risks().await?;
    success(risks)
}

/// POST /api/risk - Create or overwrite the rating for a destination
/// (admin/manager only).
pub async fn upsert_risk(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<UpsertRiskRequest>,
) -> ApiResult<RiskRating> {
    auth_user.require_role(&[Role::Admin, Role::Manager])?;

    let country = require_text(&request.country, "Country")?;
    let level = require_text(&request.level, "Level")?;
    let level = RiskLevel::from_str(&level)
        .ok_or_else(|| AppError::Validation(format!("Invalid risk level: {}", level)))?;

    let city = request
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let description = request.description.clone().unwrap_or_default();
    let date = request
        .date
        .clone()
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    let rating = state
        .repo
        .upsert_risk(
            &country,
            city,
            level,
            &description,
            &date,
            request.weather.as_ref(),
        )
        .await?;

    state.events.broadcast_global(events::DASHBOARD_UPDATED);
    state.events.broadcast_global(events::SAFETY_UPDATED);

    success(rating)
}

/// DELETE /api/risk/:id - Remove a rating (admin/manager only).
pub async fn delete_risk(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    auth_user.require_role(&[Role::Admin, Role::Manager])?;

    state.repo.delete_risk(&id).await?;

    state.events.broadcast_global(events::SAFETY_UPDATED);

    success(())
}

/// Query parameters for the weather lookup.
#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: String,
}

/// Weather-derived risk suggestion for a city.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRisk {
    pub city: String,
    pub level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
}

/// GET /api/risk/weather?city= - Classify current conditions for a city.
///
/// Falls back to a neutral Low entry when the weather API is unavailable.
pub async fn weather_lookup(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> ApiResult<WeatherRisk> {
    let snapshot = state.weather.current(&query.city).await;

    let level = match &snapshot {
        Some(snapshot) => weather::classify(
            &snapshot.main,
            snapshot.temp_c.unwrap_or(0.0),
            snapshot.wind_kmh.unwrap_or(0.0),
            snapshot.humidity.unwrap_or(0.0),
        ),
        None => RiskLevel::Low,
    };

    success(WeatherRisk {
        city: query.city,
        level,
        weather: snapshot,
    })
}
