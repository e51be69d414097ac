//! Reporting API endpoints: dashboard, KPIs, analytics, and history.

use axum::{
    extract::{Query, State},
    Extension,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::AuthUser;
use crate::models::{Expense, Role, Trip};
use crate::AppState;

/// A shortcut tile on the employee dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAction {
    pub title: &'static str,
    pub path: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

const QUICK_ACTIONS: &[QuickAction] = &[
    QuickAction {
        title: "New Trip Request",
        path: "/trip-request",
        icon: "✈️",
        color: "#3498db",
    },
    QuickAction {
        title: "View Itinerary",
        path: "/itinerary",
        icon: "📋",
        color: "#27ae60",
    },
    QuickAction {
        title: "Safety Checklist",
        path: "/safety",
        icon: "✅",
        color: "#f39c12",
    },
    QuickAction {
        title: "Upload Expenses",
        path: "/expenses",
        icon: "💰",
        color: "#9b59b6",
    },
    QuickAction {
        title: "ESG Tracking",
        path: "/esg-tracking",
        icon: "🌱",
        color: "#10b981",
    },
    QuickAction {
        title: "Trip History",
        path: "/trip-history",
        icon: "📊",
        color: "#8b5cf6",
    },
];

/// One row in the recent-activity feed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub action: String,
    pub date: String,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    pub status: String,
}

/// Per-user headline numbers for the dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_trips: i64,
    pub pending_expenses: f64,
    pub alerts: i64,
    pub esg_score: f64,
    pub co2_this_month: f64,
    pub budget_used: f64,
}

/// GET /api/dashboard response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub quick_actions: &'static [QuickAction],
    pub recent_activity: Vec<ActivityEntry>,
    pub stats: DashboardStats,
}

/// GET /api/dashboard - The caller's dashboard.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<DashboardResponse> {
    let user_id = &auth_user.id;

    let stats = DashboardStats {
        active_trips: state.repo.count_active_trips(user_id).await?,
        pending_expenses: state.repo.sum_pending_expenses(user_id).await?,
        alerts: state.repo.count_unread_alerts(user_id).await?,
        esg_score: state.repo.average_esg_score(user_id).await?.round(),
        co2_this_month: state.repo.co2_this_month(user_id).await?,
        budget_used: state.repo.sum_expenses(user_id).await?,
    };

    let trips = state.repo.recent_trips_for_user(user_id, 5).await?;
    let expenses = state.repo.recent_expenses_for_user(user_id, 5).await?;
    let recent_activity = merge_activity(trips, expenses, 5);

    success(DashboardResponse {
        quick_actions: QUICK_ACTIONS,
        recent_activity,
        stats,
    })
}

/// Query parameters for the KPI endpoint.
#[derive(Debug, Deserialize)]
pub struct KpiQuery {
    #[serde(default)]
    pub range: Option<String>,
}

/// GET /api/kpi response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiResponse {
    pub total_trips: i64,
    pub approved_trips: i64,
    pub pending_trips: i64,
    pub rejected_trips: i64,
    pub cancelled_trips: i64,
    pub distinct_travelers: i64,
    pub destinations_count: i64,
    pub total_budget: f64,
    pub total_spend: f64,
    pub total_airfare: f64,
    pub total_hotels: f64,
    pub total_meals: f64,
    /// Share of decided-or-pending trips that were approved, in percent.
    pub approval_rate: i64,
}

/// GET /api/kpi - Fleet-wide metrics (admin/manager only).
pub async fn kpi(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<KpiQuery>,
) -> ApiResult<KpiResponse> {
    auth_user.require_role(&[Role::Admin, Role::Manager])?;

    let days_back = match query.range.as_deref() {
        Some("7d") => 7,
        Some("90d") => 90,
        Some("365d") => 365,
        _ => 30,
    };
    let since = (Utc::now() - Duration::days(days_back)).to_rfc3339();

    let trips = state.repo.kpi_trip_stats().await?;
    let expenses = state.repo.kpi_expense_stats(&since).await?;

    let approval_rate = if trips.total_trips > 0 {
        ((trips.approved_trips as f64 / trips.total_trips as f64) * 100.0).round() as i64
    } else {
        0
    };

    success(KpiResponse {
        total_trips: trips.total_trips,
        approved_trips: trips.approved_trips,
        pending_trips: trips.pending_trips,
        rejected_trips: trips.rejected_trips,
        cancelled_trips: trips.cancelled_trips,
        distinct_travelers: trips.distinct_travelers,
        destinations_count: trips.destinations_count,
        total_budget: trips.total_budget,
        total_spend: expenses.total_spend,
        total_airfare: expenses.total_airfare,
        total_hotels: expenses.total_hotels,
        total_meals: expenses.total_meals,
        approval_rate,
    })
}

/// Query parameters for the analytics endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A trip in the admin analytics shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsTrip {
    pub id: String,
    pub destination: String,
    pub start: String,
    pub end: String,
    pub status: String,
    pub requester: String,
    pub purpose: String,
    pub cost_estimate: f64,
}

/// One month of trip volume and spend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub month: String,
    pub trips: i64,
    pub spend: f64,
}

/// Request volume for one destination.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationBreakdown {
    pub destination: String,
    pub count: i64,
    pub total_budget: f64,
}

/// GET /api/analytics response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub trips: Vec<AnalyticsTrip>,
    pub monthly_trend: Vec<TrendPoint>,
    pub destinations: Vec<DestinationBreakdown>,
}

/// Cap on the trip list returned by the analytics endpoint.
const ANALYTICS_TRIP_LIMIT: i64 = 500;

/// GET /api/analytics - Trip analytics (admin/manager only).
pub async fn analytics(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<AnalyticsResponse> {
    auth_user.require_role(&[Role::Admin, Role::Manager])?;

    let start = query.start_date.as_deref();
    let end = query.end_date.as_deref();

    let trips = state
        .repo
        .analytics_trips(start, end, ANALYTICS_TRIP_LIMIT)
        .await?
        .into_iter()
        .map(|trip| AnalyticsTrip {
            id: trip.id,
            destination: trip.destination,
            start: trip.start_date,
            end: trip.end_date,
            status: trip.status.as_str().to_string(),
            requester: trip.employee_name,
            purpose: trip.purpose,
            cost_estimate: trip.budget,
        })
        .collect();

    let monthly_trend = state
        .repo
        .monthly_trend(start, end)
        .await?
        .into_iter()
        .map(|point| TrendPoint {
            month: point.month,
            trips: point.trips,
            spend: point.spend,
        })
        .collect();

    let destinations = state
        .repo
        .destination_breakdown(start, end)
        .await?
        .into_iter()
        .map(|stat| DestinationBreakdown {
            destination: stat.destination,
            count: stat.count,
            total_budget: stat.total_budget,
        })
        .collect();

    success(AnalyticsResponse {
        trips,
        monthly_trend,
        destinations,
    })
}

/// Cap on the merged history feed.
const HISTORY_LIMIT: usize = 50;

/// GET /api/history - The caller's merged trip and expense activity.
pub async fn history(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<ActivityEntry>> {
    let trips = state
        .repo
        .recent_trips_for_user(&auth_user.id, HISTORY_LIMIT as i64)
        .await?;
    let expenses = state
        .repo
        .recent_expenses_for_user(&auth_user.id, HISTORY_LIMIT as i64)
        .await?;

    success(merge_activity(trips, expenses, HISTORY_LIMIT))
}

/// Merge trips and expenses into one feed, newest first.
fn merge_activity(trips: Vec<Trip>, expenses: Vec<Expense>, limit: usize) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = trips
        .into_iter()
        .map(|trip| ActivityEntry {
            action: format!("Trip to {}", trip.destination),
            date: trip.updated_at,
            entry_type: "trip",
            status: trip.status.as_str().to_string(),
        })
        .chain(expenses.into_iter().map(|expense| ActivityEntry {
            action: format!("Expense: {}", expense.title),
            date: expense.updated_at,
            entry_type: "expense",
            status: expense.status.as_str().to_string(),
        }))
        .collect();

    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(limit);
    entries
}
