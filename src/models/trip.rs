//! Trip model and the travel request lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a travel request.
///
/// Cancellation is an explicit terminal state rather than a row deletion so
/// the approval history of a withdrawn request survives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "Pending",
            TripStatus::Approved => "Approved",
            TripStatus::Rejected => "Rejected",
            TripStatus::Cancelled => "Cancelled",
        }
    }

    /// Parse a status tag, accepting any casing the clients send.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(TripStatus::Pending),
            "approved" => Some(TripStatus::Approved),
            "rejected" => Some(TripStatus::Rejected),
            "cancelled" | "canceled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether a transition to `next` is legal.
    ///
    /// Nothing returns to Pending, and Cancelled is terminal. An approval
    /// decision may be revised (Approved <-> Rejected) until the trip is
    /// cancelled.
    pub fn can_transition(self, next: TripStatus) -> bool {
        if self == TripStatus::Cancelled {
            return false;
        }
        next != TripStatus::Pending
    }
}

/// A travel request owned by the employee who submitted it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub employee_name: String,
    pub destination: String,
    pub purpose: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<String>,
    /// Estimated emissions for the trip, used by carbon reporting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2_kg: Option<f64>,
    pub status: TripStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Trip shape returned by the listing endpoints.
///
/// Free-text tags fall back to display defaults so the portals never render
/// empty cells, and `submittedDate` aliases the creation timestamp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripView {
    pub id: String,
    pub user_id: String,
    pub employee_name: String,
    pub destination: String,
    pub purpose: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: f64,
    pub urgency: String,
    pub accommodation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2_kg: Option<f64>,
    pub status: TripStatus,
    pub submitted_date: String,
}

impl From<Trip> for TripView {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            user_id: trip.user_id,
            employee_name: trip.employee_name,
            destination: trip.destination,
            purpose: trip.purpose,
            start_date: trip.start_date,
            end_date: trip.end_date,
            budget: trip.budget,
            urgency: trip.urgency.unwrap_or_else(|| "N/A".to_string()),
            accommodation: trip.accommodation.unwrap_or_else(|| "N/A".to_string()),
            co2_kg: trip.co2_kg,
            status: trip.status,
            submitted_date: trip.created_at,
        }
    }
}

/// Request body for creating a new travel request.
///
/// Required fields are optional here so the handler can report which one is
/// missing instead of failing body extraction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub accommodation: Option<String>,
    #[serde(default)]
    pub co2_kg: Option<f64>,
}

/// A validated travel request, ready to persist.
///
/// Built by the handler once the required fields have been checked; the
/// owner and display name come from the caller's token.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub user_id: String,
    pub employee_name: String,
    pub destination: String,
    pub purpose: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: f64,
    pub urgency: Option<String>,
    pub accommodation: Option<String>,
    pub co2_kg: Option<f64>,
}

/// Request body for updating a trip's status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTripStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(TripStatus::from_str("pending"), Some(TripStatus::Pending));
        assert_eq!(TripStatus::from_str("APPROVED"), Some(TripStatus::Approved));
        assert_eq!(TripStatus::from_str("Rejected"), Some(TripStatus::Rejected));
        assert_eq!(TripStatus::from_str("canceled"), Some(TripStatus::Cancelled));
        assert_eq!(TripStatus::from_str("done"), None);
    }

    #[test]
    fn test_pending_is_never_a_target() {
        for from in [
            TripStatus::Pending,
            TripStatus::Approved,
            TripStatus::Rejected,
            TripStatus::Cancelled,
        ] {
            assert!(!from.can_transition(TripStatus::Pending));
        }
    }

    #[test]
    fn test_cancelled_is_terminal() {
        assert!(!TripStatus::Cancelled.can_transition(TripStatus::Approved));
        assert!(!TripStatus::Cancelled.can_transition(TripStatus::Rejected));
        assert!(!TripStatus::Cancelled.can_transition(TripStatus::Cancelled));
    }

    #[test]
    fn test_decision_can_be_revised() {
        assert!(TripStatus::Approved.can_transition(TripStatus::Rejected));
        assert!(TripStatus::Rejected.can_transition(TripStatus::Approved));
        assert!(TripStatus::Approved.can_transition(TripStatus::Cancelled));
    }

    #[test]
    fn test_view_substitutes_display_defaults() {
        let trip = Trip {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            employee_name: "Jo Field".to_string(),
            destination: "Paris".to_string(),
            purpose: "Client visit".to_string(),
            start_date: "2025-12-01".to_string(),
            end_date: "2025-12-05".to_string(),
            budget: 2000.0,
            urgency: None,
            accommodation: None,
            co2_kg: None,
            status: TripStatus::Pending,
            created_at: "2025-11-20T10:00:00+00:00".to_string(),
            updated_at: "2025-11-20T10:00:00+00:00".to_string(),
        };

        let view = TripView::from(trip);
        assert_eq!(view.urgency, "N/A");
        assert_eq!(view.accommodation, "N/A");
        assert_eq!(view.submitted_date, "2025-11-20T10:00:00+00:00");
    }
}
