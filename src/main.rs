//! Corporate Travel Management Backend
//!
//! A production-grade REST backend with SQLite persistence, JWT
//! authentication, receipt uploads, and a WebSocket fan-out channel for
//! live portal updates.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod events;
mod models;
mod weather;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use events::EventHub;
use weather::WeatherClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub events: Arc<EventHub>,
    pub weather: WeatherClient,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Travel Management Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Upload directory: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Authentication fails closed without a secret
    if config.jwt_secret.is_none() {
        tracing::warn!("No token secret configured (TRAVEL_JWT_SECRET). Logins will fail!");
    }
    if config.weather_api_key.is_none() {
        tracing::info!("No weather API key configured (TRAVEL_WEATHER_API_KEY); advisories fall back to Low");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Ensure the upload directory exists before the first receipt arrives
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Create application state
    let state = AppState {
        repo,
        events: Arc::new(EventHub::new()),
        weather: WeatherClient::new(config.weather_api_key.clone()),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone the signing secret for the auth layer
    let secret = state.config.jwt_secret.clone();

    // Routes reachable without a token
    let open_routes = Router::new()
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login));

    // Everything else requires a valid bearer token
    let protected_routes = Router::new()
        // Accounts
        .route("/auth/me", get(api::me))
        .route("/auth/users", get(api::list_users))
        // Travel requests
        .route("/travel", get(api::list_all_trips).post(api::create_trip))
        .route("/travel/my", get(api::list_my_trips))
        .route("/travel/{id}/status", put(api::update_trip_status))
        .route(
            "/travel/{id}",
            put(api::update_trip_status)
                .patch(api::update_trip_status)
                .delete(api::cancel_trip),
        )
        // Expenses
        .route("/expenses", get(api::list_expenses).post(api::create_expense))
        .route("/expenses/{id}", get(api::get_expense))
        .route("/expenses/{id}/status", put(api::update_expense_status))
        // Risk ratings
        .route("/risk", get(api::list_risks).post(api::upsert_risk))
        .route("/risk/weather", get(api::weather_lookup))
        .route("/risk/{id}", delete(api::delete_risk))
        // Safety
        .route(
            "/safety/alerts",
            get(api::list_alerts).post(api::create_alert),
        )
        .route("/safety/alerts/read-all", patch(api::mark_all_alerts_read))
        .route("/safety/alerts/read/{id}", patch(api::mark_alert_read))
        .route("/safety/alerts/{id}", delete(api::delete_alert))
        .route("/safety/emergency/{country}", get(api::emergency_numbers))
        // Policies
        .route("/policy", get(api::list_policies).post(api::create_policy))
        .route("/policy/{id}", get(api::get_policy).put(api::update_policy))
        // ESG
        .route("/esg", get(api::list_esg_records).post(api::create_esg_record))
        // Itinerary
        .route("/itinerary/{trip_id}", get(api::get_itinerary))
        .route("/itinerary/{trip_id}/schedule", post(api::add_schedule_item))
        .route("/itinerary/{trip_id}/cards", post(api::add_travel_card))
        // Reporting
        .route("/dashboard", get(api::dashboard))
        .route("/kpi", get(api::kpi))
        .route("/analytics", get(api::analytics))
        .route("/history", get(api::history))
        .layer(middleware::from_fn(move |req, next| {
            auth::bearer_auth_layer(secret.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", open_routes.merge(protected_routes))
        .route("/ws", get(events::ws_handler))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
