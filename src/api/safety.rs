//! Safety API endpoints: travel alerts and emergency numbers.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{require_text, success, ApiResult};
use crate::auth::AuthUser;
use crate::models::{Alert, CreateAlertRequest, EmergencyNumbers};
use crate::AppState;

/// GET /api/safety/alerts - All alerts, newest first.
pub async fn list_alerts(State(state): State<AppState>) -> ApiResult<Vec<Alert>> {
    let alerts = state.repo.list_alerts().await?;
    success(alerts)
}

/// POST /api/safety/alerts - Record a travel alert.
pub async fn create_alert(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Json(request): Json<CreateAlertRequest>,
) -> ApiResult<Alert> {
    let trip_id = require_text(&request.trip_id, "Trip id")?;
    let alert_type = require_text(&request.alert_type, "Alert type")?;
    let message = require_text(&request.message, "Message")?;

    let alert = state
        .repo
        .create_alert(&trip_id, &alert_type, &message)
        .await?;

    success(alert)
}

/// PATCH /api/safety/alerts/read/:id - Mark one alert as read.
pub async fn mark_alert_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Alert> {
    let alert = state.repo.mark_alert_read(&id).await?;
    success(alert)
}

/// PATCH /api/safety/alerts/read-all - Mark every alert as read.
pub async fn mark_all_alerts_read(State(state): State<AppState>) -> ApiResult<()> {
    state.repo.mark_all_alerts_read().await?;
    success(())
}

/// DELETE /api/safety/alerts/:id - Remove an alert.
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_alert(&id).await?;
    success(())
}

/// Emergency service numbers by lowercase country or city name.
const EMERGENCY_DIRECTORY: &[(&str, &str, &str, &str)] = &[
    // (name, police, ambulance, fire)
    ("singapore", "999", "995", "995"),
    ("india", "100", "102", "101"),
    ("china", "110", "120", "119"),
    ("japan", "110", "119", "119"),
    ("south korea", "112", "119", "119"),
    ("thailand", "191", "1669", "199"),
    ("malaysia", "999", "999", "994"),
    ("indonesia", "110", "118", "113"),
    ("philippines", "117", "911", "160"),
    ("vietnam", "113", "115", "114"),
    ("united kingdom", "999", "999", "999"),
    ("uk", "999", "999", "999"),
    ("france", "17", "15", "18"),
    ("germany", "110", "112", "112"),
    ("italy", "113", "118", "115"),
    ("spain", "091", "061", "080"),
    ("netherlands", "112", "112", "112"),
    ("switzerland", "117", "144", "118"),
    ("united states", "911", "911", "911"),
    ("usa", "911", "911", "911"),
    ("canada", "911", "911", "911"),
    ("mexico", "911", "911", "911"),
    ("brazil", "190", "192", "193"),
    ("argentina", "911", "107", "100"),
    ("united arab emirates", "999", "998", "997"),
    ("uae", "999", "998", "997"),
    ("saudi arabia", "999", "997", "998"),
    ("israel", "100", "101", "102"),
    ("australia", "000", "000", "000"),
    ("new zealand", "111", "111", "111"),
    ("south africa", "10111", "10177", "10111"),
    ("egypt", "122", "123", "180"),
];

/// Returned for countries not in the directory (the EU-wide number).
const DEFAULT_EMERGENCY: (&str, &str, &str) = ("112", "112", "112");

/// GET /api/safety/emergency/:country - Emergency numbers for a country.
pub async fn emergency_numbers(Path(country): Path<String>) -> ApiResult<EmergencyNumbers> {
    let key = country.trim().to_lowercase();

    let (police, ambulance, fire) = EMERGENCY_DIRECTORY
        .iter()
        .find(|(name, _, _, _)| *name == key)
        .map(|(_, police, ambulance, fire)| (*police, *ambulance, *fire))
        .unwrap_or(DEFAULT_EMERGENCY);

    success(EmergencyNumbers {
        country,
        police,
        ambulance,
        fire,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_lookup() {
        let hit = EMERGENCY_DIRECTORY
            .iter()
            .find(|(name, _, _, _)| *name == "japan")
            .unwrap();
        assert_eq!(hit.1, "110");
        assert_eq!(hit.2, "119");
    }
}
