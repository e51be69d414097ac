//! Integration tests for the travel backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::events::EventHub;
use crate::weather::WeatherClient;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_secret(Some("test-secret".to_string())).await
    }

    async fn with_secret(jwt_secret: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let upload_dir = temp_dir.path().join("uploads");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let config = Config {
            jwt_secret,
            db_path,
            upload_dir,
            max_upload_bytes: 10 * 1024 * 1024,
            weather_api_key: None,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let state = AppState {
            repo,
            events: Arc::new(EventHub::new()),
            weather: WeatherClient::new(None),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn ws_url(&self) -> String {
        format!("{}/ws", self.base_url.replace("http://", "ws://"))
    }

    /// Register an account and log in, returning (token, user id).
    async fn signup(&self, name: &str, email: &str, role: &str) -> (String, String) {
        let register = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": "correct horse",
                "role": role
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(register.status(), 200, "registration failed");

        let login: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": "correct horse" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let token = login["data"]["token"].as_str().unwrap().to_string();
        let user_id = login["data"]["user"]["id"].as_str().unwrap().to_string();
        (token, user_id)
    }

    /// Submit a basic trip request, returning its id.
    async fn submit_trip(&self, token: &str, destination: &str) -> String {
        let resp: Value = self
            .client
            .post(self.url("/api/travel"))
            .bearer_auth(token)
            .json(&json!({
                "destination": destination,
                "purpose": "Client visit",
                "startDate": "2025-12-01",
                "endDate": "2025-12-05",
                "budget": 2000
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        resp["data"]["id"].as_str().unwrap().to_string()
    }
}

/// Read the next text frame from a socket, with a deadline.
async fn next_ws_text<S>(socket: &mut S) -> Option<String>
where
    S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match timeout(Duration::from_secs(2), socket.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => return Some(text),
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_register_and_login() {
    let fixture = TestFixture::new().await;
    let (token, user_id) = fixture.signup("Avery Chen", "avery@example.com", "employee").await;
    assert!(!token.is_empty());
    assert!(!user_id.is_empty());

    // Wrong password and unknown email are the same generic failure
    let wrong_password = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "avery@example.com", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), 401);

    let unknown_email = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "ghost@example.com", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_email.status(), 401);

    // Duplicate registration is a validation error
    let duplicate = fixture
        .client
        .post(fixture.url("/api/auth/register"))
        .json(&json!({
            "name": "Avery Again",
            "email": "avery@example.com",
            "password": "pw",
            "role": "employee"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 400);

    // Unknown role is rejected
    let bad_role = fixture
        .client
        .post(fixture.url("/api/auth/register"))
        .json(&json!({
            "name": "X",
            "email": "x@example.com",
            "password": "pw",
            "role": "supervisor"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_role.status(), 400);
}

#[tokio::test]
async fn test_login_fails_closed_without_secret() {
    let fixture = TestFixture::with_secret(None).await;

    let register = fixture
        .client
        .post(fixture.url("/api/auth/register"))
        .json(&json!({
            "name": "Avery Chen",
            "email": "avery@example.com",
            "password": "pw",
            "role": "employee"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(register.status(), 200);

    let login = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "avery@example.com", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 500);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/travel/my"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let garbage = fixture
        .client
        .get(fixture.url("/api/travel/my"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 401);
    let body: Value = garbage.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_trip_validation_rejects_missing_fields() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    for body in [
        json!({ "purpose": "p", "startDate": "2025-12-01", "endDate": "2025-12-05" }),
        json!({ "destination": "Paris", "startDate": "2025-12-01", "endDate": "2025-12-05" }),
        json!({ "destination": "Paris", "purpose": "p", "endDate": "2025-12-05" }),
        json!({ "destination": "Paris", "purpose": "p", "startDate": "2025-12-01" }),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/travel"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    // Nothing was persisted
    let my: Value = fixture
        .client
        .get(fixture.url("/api/travel/my"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(my["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_trip_submission_starts_pending() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/travel"))
        .bearer_auth(&token)
        .json(&json!({
            "destination": "Paris",
            "purpose": "Client visit",
            "startDate": "2025-12-01",
            "endDate": "2025-12-05",
            "budget": 2000
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["data"]["status"]
        .as_str()
        .unwrap()
        .eq_ignore_ascii_case("pending"));

    // The owner sees it in their own list, with display defaults applied
    let my: Value = fixture
        .client
        .get(fixture.url("/api/travel/my"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let trips = my["data"].as_array().unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0]["destination"], "Paris");
    assert_eq!(trips[0]["budget"], 2000.0);
    assert_eq!(trips[0]["urgency"], "N/A");
    assert!(trips[0]["submittedDate"].is_string());
}

#[tokio::test]
async fn test_admin_approves_trip() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let trip_id = fixture.submit_trip(&employee, "Paris").await;

    let patch = fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(patch.status(), 200);

    // Visible on the admin listing
    let all: Value = fixture
        .client
        .get(fixture.url("/api/travel"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let trips = all["data"].as_array().unwrap();
    assert_eq!(trips.len(), 1);
    assert!(trips[0]["status"]
        .as_str()
        .unwrap()
        .eq_ignore_ascii_case("approved"));
}

#[tokio::test]
async fn test_employee_cannot_change_status() {
    let fixture = TestFixture::new().await;
    let (owner, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (other, _) = fixture.signup("Riley", "riley@example.com", "employee").await;

    let trip_id = fixture.submit_trip(&owner, "Paris").await;

    let patch = fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&other)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(patch.status(), 403);
    let body: Value = patch.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Stored status is unchanged
    let my: Value = fixture
        .client
        .get(fixture.url("/api/travel/my"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(my["data"][0]["status"]
        .as_str()
        .unwrap()
        .eq_ignore_ascii_case("pending"));
}

#[tokio::test]
async fn test_status_update_validation() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let trip_id = fixture.submit_trip(&employee, "Paris").await;

    // Arbitrary strings are not accepted as statuses
    let bogus = fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "on-hold" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status(), 400);

    // Unknown trip is a 404
    let missing = fixture
        .client
        .patch(fixture.url("/api/travel/no-such-trip"))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    // Nothing returns to Pending once decided
    fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    let back_to_pending = fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(back_to_pending.status(), 400);
}

#[tokio::test]
async fn test_cancellation_preserves_the_row_and_is_terminal() {
    let fixture = TestFixture::new().await;
    let (owner, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let trip_id = fixture.submit_trip(&owner, "Paris").await;

    // The owner may withdraw their own request
    let cancel = fixture
        .client
        .delete(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), 200);

    // The row survives with an explicit Cancelled status
    let my: Value = fixture
        .client
        .get(fixture.url("/api/travel/my"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(my["data"].as_array().unwrap().len(), 1);
    assert!(my["data"][0]["status"]
        .as_str()
        .unwrap()
        .eq_ignore_ascii_case("cancelled"));

    // Cancelled is terminal
    let revive = fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(revive.status(), 400);
}

#[tokio::test]
async fn test_other_employees_cannot_cancel() {
    let fixture = TestFixture::new().await;
    let (owner, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (other, _) = fixture.signup("Riley", "riley@example.com", "employee").await;

    let trip_id = fixture.submit_trip(&owner, "Paris").await;

    let cancel = fixture
        .client
        .delete(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), 403);
}

#[tokio::test]
async fn test_admin_listing_is_stable_and_gated() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    fixture.submit_trip(&employee, "Paris").await;
    fixture.submit_trip(&employee, "Tokyo").await;

    // Employees cannot list all trips
    let forbidden = fixture
        .client
        .get(fixture.url("/api/travel"))
        .bearer_auth(&employee)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    // Two reads with no intervening writes return the same ordered set
    let ids = |body: &Value| -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap().to_string())
            .collect()
    };

    let first: Value = fixture
        .client
        .get(fixture.url("/api/travel"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: Value = fixture
        .client
        .get(fixture.url("/api/travel"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(ids(&first).len(), 2);
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_owner_receives_exactly_one_status_event() {
    let fixture = TestFixture::new().await;
    let (owner, owner_id) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let trip_id = fixture.submit_trip(&owner, "Paris").await;

    // Connect and join the owner's room
    let (mut socket, _) = tokio_tungstenite::connect_async(fixture.ws_url())
        .await
        .expect("WebSocket connect failed");
    socket
        .send(WsMessage::Text(
            json!({ "event": "join", "userId": owner_id }).to_string(),
        ))
        .await
        .unwrap();

    let ack = next_ws_text(&mut socket).await.expect("no join ack");
    assert!(ack.contains("joined"));

    // Approve the trip
    let patch = fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(patch.status(), 200);

    // The room event names the trip and its new status
    let event = next_ws_text(&mut socket).await.expect("no status event");
    let parsed: Value = serde_json::from_str(&event).unwrap();
    assert_eq!(parsed["event"], "tripStatusUpdated");
    assert_eq!(parsed["payload"]["tripId"], trip_id.as_str());
    assert!(parsed["payload"]["status"]
        .as_str()
        .unwrap()
        .eq_ignore_ascii_case("approved"));

    // Followed by the global dashboard refresh, and nothing else
    let dashboard = next_ws_text(&mut socket).await.expect("no dashboard event");
    assert!(dashboard.contains("dashboardUpdated"));
    assert!(next_ws_text(&mut socket).await.is_none());
}

#[tokio::test]
async fn test_trip_creation_announces_to_owner_room() {
    let fixture = TestFixture::new().await;
    let (owner, owner_id) = fixture.signup("Avery", "avery@example.com", "employee").await;

    let (mut socket, _) = tokio_tungstenite::connect_async(fixture.ws_url())
        .await
        .expect("WebSocket connect failed");
    socket
        .send(WsMessage::Text(
            json!({ "event": "join", "userId": owner_id }).to_string(),
        ))
        .await
        .unwrap();
    next_ws_text(&mut socket).await.expect("no join ack");

    fixture.submit_trip(&owner, "Paris").await;

    let event = next_ws_text(&mut socket).await.expect("no trips event");
    assert!(event.contains("tripsUpdated"));
    let dashboard = next_ws_text(&mut socket).await.expect("no dashboard event");
    assert!(dashboard.contains("dashboardUpdated"));
}

#[tokio::test]
async fn test_expense_receipt_round_trip() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    let receipt_bytes = b"%PDF-1.4 fake receipt bytes".to_vec();
    let form = reqwest::multipart::Form::new()
        .text("title", "Airport taxi")
        .text("amount", "42.5")
        .text("category", "Transport")
        .text("date", "2025-12-02")
        .text("notes", "Late arrival")
        .part(
            "receipt",
            reqwest::multipart::Part::bytes(receipt_bytes.clone()).file_name("taxi receipt.pdf"),
        );

    let created: Value = fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["status"], "pending");
    let expense_id = created["data"]["id"].as_str().unwrap();
    let receipt_path = created["data"]["receiptPath"].as_str().unwrap();
    assert!(receipt_path.starts_with("/uploads/"));

    // Fetching by id returns the same stored path
    let fetched: Value = fixture
        .client
        .get(fixture.url(&format!("/api/expenses/{}", expense_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["data"]["receiptPath"], receipt_path);

    // The stored path resolves to the originally uploaded bytes
    let served = fixture
        .client
        .get(fixture.url(receipt_path))
        .send()
        .await
        .unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().to_vec(), receipt_bytes);
}

#[tokio::test]
async fn test_expense_validation() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    // Missing amount is rejected
    let no_amount = reqwest::multipart::Form::new()
        .text("title", "Taxi")
        .text("category", "Transport")
        .text("date", "2025-12-02")
        .part(
            "receipt",
            reqwest::multipart::Part::bytes(b"x".to_vec()).file_name("r.pdf"),
        );
    let resp = fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&token)
        .multipart(no_amount)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // A zero amount is accepted
    let zero_amount = reqwest::multipart::Form::new()
        .text("title", "Comped lunch")
        .text("amount", "0")
        .text("category", "Meals")
        .text("date", "2025-12-02")
        .part(
            "receipt",
            reqwest::multipart::Part::bytes(b"x".to_vec()).file_name("r.pdf"),
        );
    let resp = fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&token)
        .multipart(zero_amount)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // A missing receipt is rejected
    let no_receipt = reqwest::multipart::Form::new()
        .text("title", "Taxi")
        .text("amount", "10")
        .text("category", "Transport")
        .text("date", "2025-12-02");
    let resp = fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&token)
        .multipart(no_receipt)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_expense_review_is_admin_only() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (manager, _) = fixture.signup("Jules", "jules@example.com", "manager").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let form = reqwest::multipart::Form::new()
        .text("title", "Hotel")
        .text("amount", "300")
        .text("category", "Accommodation")
        .text("date", "2025-12-03")
        .part(
            "receipt",
            reqwest::multipart::Part::bytes(b"r".to_vec()).file_name("hotel.pdf"),
        );
    let created: Value = fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&employee)
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let expense_id = created["data"]["id"].as_str().unwrap();

    let as_manager = fixture
        .client
        .put(fixture.url(&format!("/api/expenses/{}/status", expense_id)))
        .bearer_auth(&manager)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(as_manager.status(), 403);

    let as_admin = fixture
        .client
        .put(fixture.url(&format!("/api/expenses/{}/status", expense_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert_eq!(as_admin.status(), 200);
    let body: Value = as_admin.json().await.unwrap();
    assert_eq!(body["data"]["status"], "approved");
}

#[tokio::test]
async fn test_employees_only_see_their_own_expenses() {
    let fixture = TestFixture::new().await;
    let (avery, avery_id) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (riley, _) = fixture.signup("Riley", "riley@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let form = reqwest::multipart::Form::new()
        .text("title", "Taxi")
        .text("amount", "20")
        .text("category", "Transport")
        .text("date", "2025-12-02")
        .part(
            "receipt",
            reqwest::multipart::Part::bytes(b"r".to_vec()).file_name("r.pdf"),
        );
    fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&avery)
        .multipart(form)
        .send()
        .await
        .unwrap();

    let riley_list: Value = fixture
        .client
        .get(fixture.url("/api/expenses"))
        .bearer_auth(&riley)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(riley_list["data"].as_array().unwrap().len(), 0);

    // Admins may filter by owner
    let admin_list: Value = fixture
        .client
        .get(fixture.url(&format!("/api/expenses?userId={}", avery_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(admin_list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_risk_upsert_overwrites_in_place() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    // Employees cannot write ratings
    let forbidden = fixture
        .client
        .post(fixture.url("/api/risk"))
        .bearer_auth(&employee)
        .json(&json!({ "country": "Japan", "level": "Low" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    let first = fixture
        .client
        .post(fixture.url("/api/risk"))
        .bearer_auth(&admin)
        .json(&json!({ "country": "Japan", "city": "Tokyo", "level": "Low" }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    // Same key again overwrites rather than appending
    let second: Value = fixture
        .client
        .post(fixture.url("/api/risk"))
        .bearer_auth(&admin)
        .json(&json!({
            "country": "Japan",
            "city": "Tokyo",
            "level": "High",
            "description": "Typhoon season",
            "weather": { "main": "Storm", "tempC": 28, "windKmh": 80, "humidity": 85 }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let risk_id = second["data"]["id"].as_str().unwrap().to_string();

    let list: Value = fixture
        .client
        .get(fixture.url("/api/risk"))
        .bearer_auth(&employee)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let risks = list["data"].as_array().unwrap();
    assert_eq!(risks.len(), 1);
    assert_eq!(risks[0]["level"], "High");
    assert_eq!(risks[0]["weather"]["main"], "Storm");

    // Delete, then deleting again is a 404
    let deleted = fixture
        .client
        .delete(fixture.url(&format!("/api/risk/{}", risk_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    let again = fixture
        .client
        .delete(fixture.url(&format!("/api/risk/{}", risk_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn test_weather_lookup_falls_back_to_low() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    // No API key is configured in tests, so the lookup degrades silently
    let resp: Value = fixture
        .client
        .get(fixture.url("/api/risk/weather?city=Paris"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"]["level"], "Low");
    assert!(resp["data"]["weather"].is_null());
}

#[tokio::test]
async fn test_alert_lifecycle() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let trip_id = fixture.submit_trip(&token, "Paris").await;

    // Required fields
    let invalid = fixture
        .client
        .post(fixture.url("/api/safety/alerts"))
        .bearer_auth(&token)
        .json(&json!({ "tripId": trip_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);

    let created: Value = fixture
        .client
        .post(fixture.url("/api/safety/alerts"))
        .bearer_auth(&token)
        .json(&json!({
            "tripId": trip_id,
            "alertType": "Weather",
            "message": "Storm expected on arrival day"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let alert_id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["notified"], false);

    let read: Value = fixture
        .client
        .patch(fixture.url(&format!("/api/safety/alerts/read/{}", alert_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["data"]["notified"], true);

    let deleted = fixture
        .client
        .delete(fixture.url(&format!("/api/safety/alerts/{}", alert_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
}

#[tokio::test]
async fn test_emergency_directory() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    let japan: Value = fixture
        .client
        .get(fixture.url("/api/safety/emergency/Japan"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(japan["data"]["police"], "110");
    assert_eq!(japan["data"]["ambulance"], "119");

    // Unlisted countries get the international default
    let unknown: Value = fixture
        .client
        .get(fixture.url("/api/safety/emergency/Atlantis"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unknown["data"]["police"], "112");
}

#[tokio::test]
async fn test_policy_crud_is_admin_gated() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let forbidden = fixture
        .client
        .post(fixture.url("/api/policy"))
        .bearer_auth(&employee)
        .json(&json!({ "name": "Default" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    let created: Value = fixture
        .client
        .post(fixture.url("/api/policy"))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Default",
            "bookingRules": { "advanceDays": 14, "classes": ["economy"] },
            "expenseRules": { "mealCapPerDay": 75 }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let policy_id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["bookingRules"]["advanceDays"], 14);

    let updated: Value = fixture
        .client
        .put(fixture.url(&format!("/api/policy/{}", policy_id)))
        .bearer_auth(&admin)
        .json(&json!({ "expenseRules": { "mealCapPerDay": 90 } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["data"]["expenseRules"]["mealCapPerDay"], 90);
    // Untouched documents are preserved
    assert_eq!(updated["data"]["bookingRules"]["advanceDays"], 14);

    // Everyone can read policies
    let fetched: Value = fixture
        .client
        .get(fixture.url(&format!("/api/policy/{}", policy_id)))
        .bearer_auth(&employee)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["data"]["name"], "Default");
}

#[tokio::test]
async fn test_esg_records() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    let missing_year = fixture
        .client
        .post(fixture.url("/api/esg"))
        .bearer_auth(&token)
        .json(&json!({ "score": 82 }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_year.status(), 400);

    let created = fixture
        .client
        .post(fixture.url("/api/esg"))
        .bearer_auth(&token)
        .json(&json!({
            "score": 82,
            "complianceRate": 95.5,
            "co2Reduction": 12.0,
            "sustainabilityIndex": 7.8,
            "year": 2025
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 200);

    let list: Value = fixture
        .client
        .get(fixture.url("/api/esg"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = list["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["year"], 2025);
}

#[tokio::test]
async fn test_itinerary_assembly_and_ownership() {
    let fixture = TestFixture::new().await;
    let (owner, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (other, _) = fixture.signup("Riley", "riley@example.com", "employee").await;

    let trip_id = fixture.submit_trip(&owner, "Paris").await;

    fixture
        .client
        .post(fixture.url(&format!("/api/itinerary/{}/schedule", trip_id)))
        .bearer_auth(&owner)
        .json(&json!({
            "date": "2025-12-02",
            "time": "02:00 PM",
            "type": "meeting",
            "title": "Client kickoff"
        }))
        .send()
        .await
        .unwrap();
    fixture
        .client
        .post(fixture.url(&format!("/api/itinerary/{}/schedule", trip_id)))
        .bearer_auth(&owner)
        .json(&json!({
            "date": "2025-12-01",
            "time": "09:30 AM",
            "type": "flight",
            "title": "Outbound flight"
        }))
        .send()
        .await
        .unwrap();
    fixture
        .client
        .post(fixture.url(&format!("/api/itinerary/{}/cards", trip_id)))
        .bearer_auth(&owner)
        .json(&json!({ "type": "Corporate Card", "number": "**** 4821" }))
        .send()
        .await
        .unwrap();

    let itinerary: Value = fixture
        .client
        .get(fixture.url(&format!("/api/itinerary/{}", trip_id)))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(itinerary["data"]["trip"]["destination"], "Paris");
    let schedule = itinerary["data"]["schedule"].as_array().unwrap();
    assert_eq!(schedule.len(), 2);
    // Ordered by date, not insertion
    assert_eq!(schedule[0]["title"], "Outbound flight");
    assert_eq!(itinerary["data"]["cards"][0]["type"], "Corporate Card");

    // Another employee cannot view it
    let forbidden = fixture
        .client
        .get(fixture.url(&format!("/api/itinerary/{}", trip_id)))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    // Unknown trips are a 404
    let missing = fixture
        .client
        .get(fixture.url("/api/itinerary/no-such-trip"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_dashboard_stats() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    fixture.submit_trip(&token, "Paris").await;

    let form = reqwest::multipart::Form::new()
        .text("title", "Taxi")
        .text("amount", "42.5")
        .text("category", "Transport")
        .text("date", "2025-12-02")
        .part(
            "receipt",
            reqwest::multipart::Part::bytes(b"r".to_vec()).file_name("r.pdf"),
        );
    fixture
        .client
        .post(fixture.url("/api/expenses"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    let dashboard: Value = fixture
        .client
        .get(fixture.url("/api/dashboard"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let stats = &dashboard["data"]["stats"];
    assert_eq!(stats["activeTrips"], 1);
    assert_eq!(stats["pendingExpenses"], 42.5);
    assert_eq!(stats["budgetUsed"], 42.5);

    let activity = dashboard["data"]["recentActivity"].as_array().unwrap();
    assert!(!activity.is_empty());
    assert!(activity.len() <= 5);
    assert!(!dashboard["data"]["quickActions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_kpi_and_analytics() {
    let fixture = TestFixture::new().await;
    let (employee, _) = fixture.signup("Avery", "avery@example.com", "employee").await;
    let (admin, _) = fixture.signup("Morgan", "morgan@example.com", "admin").await;

    let trip_id = fixture.submit_trip(&employee, "Paris").await;
    fixture.submit_trip(&employee, "Tokyo").await;
    fixture
        .client
        .patch(fixture.url(&format!("/api/travel/{}", trip_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();

    // Reporting is gated to approvers
    let forbidden = fixture
        .client
        .get(fixture.url("/api/kpi"))
        .bearer_auth(&employee)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    let kpi: Value = fixture
        .client
        .get(fixture.url("/api/kpi?range=30d"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(kpi["data"]["totalTrips"], 2);
    assert_eq!(kpi["data"]["approvedTrips"], 1);
    assert_eq!(kpi["data"]["pendingTrips"], 1);
    assert_eq!(kpi["data"]["destinationsCount"], 2);
    assert_eq!(kpi["data"]["approvalRate"], 50);

    let analytics: Value = fixture
        .client
        .get(fixture.url("/api/analytics"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let trips = analytics["data"]["trips"].as_array().unwrap();
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0]["requester"], "Avery");
    assert!(trips[0]["costEstimate"].is_number());
    assert!(!analytics["data"]["monthlyTrend"].as_array().unwrap().is_empty());
    assert!(!analytics["data"]["destinations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_feed() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.signup("Avery", "avery@example.com", "employee").await;

    fixture.submit_trip(&token, "Paris").await;
    fixture.submit_trip(&token, "Tokyo").await;

    let history: Value = fixture
        .client
        .get(fixture.url("/api/history"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = history["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["action"].as_str().unwrap().contains("Tokyo"));
    assert_eq!(entries[0]["type"], "trip");
}
