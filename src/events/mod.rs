//! Real-time notification fan-out.
//!
//! Mutating handlers announce "something changed" to connected clients,
//! which re-fetch through the REST API; the database stays the source of
//! truth. Delivery is at-most-once and best-effort: a client that is
//! disconnected at broadcast time simply discovers the change on its next
//! fetch.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::AppState;

/// Event names pushed to clients.
pub const DASHBOARD_UPDATED: &str = "dashboardUpdated";
pub const TRIPS_UPDATED: &str = "tripsUpdated";
pub const TRIP_STATUS_UPDATED: &str = "tripStatusUpdated";
pub const SAFETY_UPDATED: &str = "safetyUpdated";
pub const EXPENSES_UPDATED: &str = "expensesUpdated";

/// Wire format for server-pushed events.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a Value>,
}

impl Envelope<'_> {
    fn to_json(&self) -> String {
        // Envelope serialization cannot fail: both fields are plain JSON.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Message a client sends over the socket.
///
/// The only recognized event is `join`, which subscribes the connection to
/// the given user's room.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientMessage {
    event: String,
    #[serde(default)]
    user_id: Option<String>,
}

type ConnectionId = u64;

#[derive(Default)]
struct HubInner {
    connections: HashMap<ConnectionId, UnboundedSender<String>>,
    /// user id -> connections subscribed to that user's room
    rooms: HashMap<String, HashSet<ConnectionId>>,
    /// reverse index for cleanup on disconnect
    members: HashMap<ConnectionId, String>,
}

impl HubInner {
    fn remove(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
        if let Some(user_id) = self.members.remove(&conn) {
            if let Some(room) = self.rooms.get_mut(&user_id) {
                room.remove(&conn);
                if room.is_empty() {
                    self.rooms.remove(&user_id);
                }
            }
        }
    }
}

/// Process-wide connected-client registry with per-user rooms.
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    inner: Mutex<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and hand back its outbound queue.
    fn register(&self) -> (ConnectionId, UnboundedReceiver<String>) {
        let conn = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().connections.insert(conn, tx);
        (conn, rx)
    }

    /// Subscribe a connection to a user's room, replacing any previous join.
    fn join_user(&self, conn: ConnectionId, user_id: &str) {
        let mut inner = self.lock();
        if let Some(previous) = inner.members.insert(conn, user_id.to_string()) {
            if let Some(room) = inner.rooms.get_mut(&previous) {
                room.remove(&conn);
                if room.is_empty() {
                    inner.rooms.remove(&previous);
                }
            }
        }
        inner.rooms.entry(user_id.to_string()).or_default().insert(conn);
    }

    /// Drop a connection from the registry and its room.
    fn deregister(&self, conn: ConnectionId) {
        self.lock().remove(conn);
    }

    /// Push an event to one connection. Used for join acknowledgments.
    fn send_to_connection(&self, conn: ConnectionId, event: &str, payload: Option<&Value>) {
        let text = Envelope { event, payload }.to_json();
        let mut inner = self.lock();
        let dead = match inner.connections.get(&conn) {
            Some(tx) => tx.send(text).is_err(),
            None => false,
        };
        if dead {
            inner.remove(conn);
        }
    }

    /// Deliver an event to every connected client.
    pub fn broadcast_global(&self, event: &str) {
        let text = Envelope { event, payload: None }.to_json();
        let mut inner = self.lock();
        let dead: Vec<ConnectionId> = inner
            .connections
            .iter()
            .filter(|(_, tx)| tx.send(text.clone()).is_err())
            .map(|(conn, _)| *conn)
            .collect();
        for conn in dead {
            inner.remove(conn);
        }
    }

    /// Deliver an event to every connection in one user's room.
    pub fn broadcast_to_user(&self, user_id: &str, event: &str, payload: Option<Value>) {
        let text = Envelope {
            event,
            payload: payload.as_ref(),
        }
        .to_json();

        let mut inner = self.lock();
        let Some(room) = inner.rooms.get(user_id) else {
            return;
        };

        let dead: Vec<ConnectionId> = room
            .iter()
            .copied()
            .filter(|conn| match inner.connections.get(conn) {
                Some(tx) => tx.send(text.clone()).is_err(),
                None => true,
            })
            .collect();
        for conn in dead {
            inner.remove(conn);
        }
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// GET /ws - upgrade to the fan-out channel.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pump events to the client and watch for join messages until it hangs up.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let hub = state.events.clone();
    let (conn, mut rx) = hub.register();
    tracing::debug!("Client connected: {} ({} online)", conn, hub.connection_count());

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let read_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(parsed) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                continue;
            };
            if parsed.event == "join" {
                if let Some(user_id) = parsed.user_id {
                    read_hub.join_user(conn, &user_id);
                    read_hub.send_to_connection(conn, "joined", None);
                }
            }
        }
    });

    // Whichever half finishes first, tear the other one down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.deregister(conn);
    tracing::debug!("Client disconnected: {} ({} online)", conn, hub.connection_count());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_global_broadcast_reaches_every_connection() {
        let hub = EventHub::new();
        let (_c1, mut rx1) = hub.register();
        let (_c2, mut rx2) = hub.register();

        hub.broadcast_global(DASHBOARD_UPDATED);

        let msg1 = rx1.try_recv().unwrap();
        let msg2 = rx2.try_recv().unwrap();
        assert_eq!(msg1, r#"{"event":"dashboardUpdated"}"#);
        assert_eq!(msg1, msg2);
    }

    #[test]
    fn test_user_broadcast_is_scoped_to_the_room() {
        let hub = EventHub::new();
        let (c1, mut rx1) = hub.register();
        let (_c2, mut rx2) = hub.register();
        hub.join_user(c1, "user-1");

        hub.broadcast_to_user(
            "user-1",
            TRIP_STATUS_UPDATED,
            Some(json!({ "tripId": "t1", "status": "Approved" })),
        );

        let msg = rx1.try_recv().unwrap();
        assert!(msg.contains("tripStatusUpdated"));
        assert!(msg.contains("\"tripId\":\"t1\""));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_to_unknown_user_is_a_no_op() {
        let hub = EventHub::new();
        let (_c1, mut rx1) = hub.register();

        hub.broadcast_to_user("nobody", TRIPS_UPDATED, None);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_rejoining_moves_the_connection_between_rooms() {
        let hub = EventHub::new();
        let (c1, mut rx1) = hub.register();
        hub.join_user(c1, "user-1");
        hub.join_user(c1, "user-2");

        hub.broadcast_to_user("user-1", TRIPS_UPDATED, None);
        assert!(rx1.try_recv().is_err());

        hub.broadcast_to_user("user-2", TRIPS_UPDATED, None);
        assert!(rx1.try_recv().is_ok());
    }

    #[test]
    fn test_dead_connections_are_pruned_on_send() {
        let hub = EventHub::new();
        let (_c1, rx1) = hub.register();
        let (_c2, _rx2) = hub.register();
        assert_eq!(hub.connection_count(), 2);

        drop(rx1);
        hub.broadcast_global(DASHBOARD_UPDATED);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_deregister_clears_the_room_index() {
        let hub = EventHub::new();
        let (c1, _rx1) = hub.register();
        hub.join_user(c1, "user-1");
        hub.deregister(c1);

        assert_eq!(hub.connection_count(), 0);
        // Broadcasting to the departed user's room must not panic or leak.
        hub.broadcast_to_user("user-1", TRIPS_UPDATED, None);
    }
}
