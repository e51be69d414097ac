//! Travel request API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::json;

use super::{require_text, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::events;
use crate::models::{
    CreateTripRequest, NewTrip, Role, Trip, TripStatus, TripView, UpdateTripStatusRequest,
};
use crate::AppState;

/// POST /api/travel - Submit a new travel request.
pub async fn create_trip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<CreateTripRequest>,
) -> ApiResult<Trip> {
    let destination = require_text(&request.destination, "Destination")?;
    let purpose = require_text(&request.purpose, "Purpose")?;
    let start_date = require_text(&request.start_date, "Start date")?;
    let end_date = require_text(&request.end_date, "End date")?;

    let new_trip = NewTrip {
        user_id: auth_user.id.clone(),
        employee_name: auth_user.name.clone(),
        destination,
        purpose,
        start_date,
        end_date,
        budget: request.budget.unwrap_or(0.0),
        urgency: request.urgency.clone(),
        accommodation: request.accommodation.clone(),
        co2_kg: request.co2_kg,
    };

    let trip = state.repo.create_trip(&new_trip).await?;

    state
        .events
        .broadcast_to_user(&auth_user.id, events::TRIPS_UPDATED, None);
    state.events.broadcast_global(events::DASHBOARD_UPDATED);

    success(trip)
}

/// GET /api/travel/my - The caller's trips, newest first.
pub async fn list_my_trips(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<TripView>> {
    let trips = state.repo.list_trips_for_user(&auth_user.id).await?;
    success(trips.into_iter().map(TripView::from).collect())
}

/// GET /api/travel - All trips, newest first (admin/manager only).
pub async fn list_all_trips(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<TripView>> {
    auth_user.require_role(&[Role::Admin, Role::Manager])?;

    let trips = state.repo.list_all_trips().await?;
    success(trips.into_iter().map(TripView::from).collect())
}

/// PUT|PATCH /api/travel/:id (and PUT /api/travel/:id/status) - Approve or
/// reject a request (admin/manager only).
pub async fn update_trip_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTripStatusRequest>,
) -> ApiResult<Trip> {
    auth_user.require_role(&[Role::Admin, Role::Manager])?;

    let status = require_text(&request.status, "Status")?;
    let status = TripStatus::from_str(&status)
        .ok_or_else(|| AppError::Validation(format!("Invalid status: {}", status)))?;

    let trip = state
        .repo
        .get_trip(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;

    if !trip.status.can_transition(status) {
        return Err(AppError::Validation(format!(
            "Cannot change status from {} to {}",
            trip.status.as_str(),
            status.as_str()
        )));
    }

    let updated = state.repo.set_trip_status(&id, status).await?;
    notify_status_change(&state, &updated);

    success(updated)
}

/// DELETE /api/travel/:id - Withdraw a request.
///
/// Cancels in place rather than deleting the row, so the request's history
/// survives. Allowed for the owner and for admin/manager.
pub async fn cancel_trip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Trip> {
    let trip = state
        .repo
        .get_trip(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;

    if trip.user_id != auth_user.id && !auth_user.role.is_approver() {
        return Err(AppError::Forbidden(
            "You are not authorized to cancel this trip".to_string(),
        ));
    }

    if !trip.status.can_transition(TripStatus::Cancelled) {
        return Err(AppError::Validation(format!(
            "Cannot change status from {} to {}",
            trip.status.as_str(),
            TripStatus::Cancelled.as_str()
        )));
    }

    let updated = state.repo.set_trip_status(&id, TripStatus::Cancelled).await?;
    notify_status_change(&state, &updated);

    success(updated)
}

/// Announce a status change to the trip's owner and refresh dashboards.
fn notify_status_change(state: &AppState, trip: &Trip) {
    state.events.broadcast_to_user(
        &trip.user_id,
        events::TRIP_STATUS_UPDATED,
        Some(json!({
            "tripId": trip.id,
            "status": trip.status,
            "message": format!("Trip to {} is now {}", trip.destination, trip.status.as_str()),
        })),
    );
    state.events.broadcast_global(events::DASHBOARD_UPDATED);
}
