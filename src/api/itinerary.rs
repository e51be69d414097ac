//! Itinerary API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{require_text, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    CreateScheduleItemRequest, CreateTravelCardRequest, Itinerary, ScheduleItem, TravelCard, Trip,
};
use crate::AppState;

/// GET /api/itinerary/:tripId - Trip details, wallet cards, and schedule.
pub async fn get_itinerary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(trip_id): Path<String>,
) -> ApiResult<Itinerary> {
    let trip = owned_trip(&state, &auth_user, &trip_id).await?;

    let cards = state.repo.list_travel_cards(&trip_id).await?;
    let schedule = state.repo.list_schedule_items(&trip_id).await?;

    success(Itinerary {
        trip,
        cards,
        schedule,
    })
}

/// POST /api/itinerary/:tripId/schedule - Add a day-by-day activity.
pub async fn add_schedule_item(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(trip_id): Path<String>,
    Json(request): Json<CreateScheduleItemRequest>,
) -> ApiResult<ScheduleItem> {
    owned_trip(&state, &auth_user, &trip_id).await?;

    require_text(&request.date, "Date")?;
    require_text(&request.time, "Time")?;
    require_text(&request.item_type, "Type")?;
    require_text(&request.title, "Title")?;

    let item = state.repo.create_schedule_item(&trip_id, &request).await?;
    success(item)
}

/// POST /api/itinerary/:tripId/cards - Add a travel wallet card.
pub async fn add_travel_card(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(trip_id): Path<String>,
    Json(request): Json<CreateTravelCardRequest>,
) -> ApiResult<TravelCard> {
    owned_trip(&state, &auth_user, &trip_id).await?;

    require_text(&request.card_type, "Type")?;

    let card = state.repo.create_travel_card(&trip_id, &request).await?;
    success(card)
}

/// Load a trip the caller may see: its owner, or any admin/manager.
async fn owned_trip(
    state: &AppState,
    auth_user: &AuthUser,
    trip_id: &str,
) -> Result<Trip, AppError> {
    let trip = state
        .repo
        .get_trip(trip_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;

    if trip.user_id != auth_user.id && !auth_user.role.is_approver() {
        return Err(AppError::Forbidden(
            "You are not authorized to view this itinerary".to_string(),
        ));
    }

    Ok(trip)
}
