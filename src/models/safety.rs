//! Safety advisories: travel-scoped alerts and emergency contact numbers.

use serde::{Deserialize, Serialize};

/// A travel-scoped advisory pushed to the safety page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub trip_id: String,
    pub alert_type: String,
    pub message: String,
    /// Whether the traveller has seen the alert.
    pub notified: bool,
    pub created_at: String,
}

/// Request body for creating an alert.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub alert_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Emergency service numbers for a country.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyNumbers {
    pub country: String,
    pub police: &'static str,
    pub ambulance: &'static str,
    pub fire: &'static str,
}
