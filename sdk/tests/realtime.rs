//! Realtime channel against in-process WebSocket and polling servers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use lexmarket_sdk::realtime::{ChannelState, ConnectionManager, RealtimeConfig, Transport};
use lexmarket_sdk::session::{MemoryStore, Session};
use lexmarket_sdk::KeyValueStore;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

struct WsServer {
    url: String,
    frames: mpsc::UnboundedReceiver<(usize, Value)>,
    push: broadcast::Sender<String>,
    connections: Arc<AtomicUsize>,
}

impl WsServer {
    /// Waits for the next client frame of the given type.
    async fn next_frame(&mut self, kind: &str) -> Value {
        self.next_frame_on(kind).await.1
    }

    /// Waits for the next client frame of the given type, with the 1-based
    /// number of the connection it arrived on.
    async fn next_frame_on(&mut self, kind: &str) -> (usize, Value) {
        loop {
            let (conn, frame) = timeout(WAIT, self.frames.recv())
                .await
                .expect("frame in time")
                .expect("server running");
            if frame["type"] == kind {
                return (conn, frame);
            }
        }
    }

    fn push_event(&self, event: &str, data: Value) {
        let frame = json!({ "type": "event", "event": event, "data": data });
        self.push.send(frame.to_string()).expect("connected client");
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Accept,
    /// Answers every auth frame with `connect_error`.
    Reject(&'static str),
    /// Closes the first connection right after `connected`.
    DropFirst,
}

async fn spawn_ws_server(mode: Mode) -> WsServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (frames_tx, frames) = mpsc::unbounded_channel();
    let (push, _) = broadcast::channel::<String>(64);
    let connections = Arc::new(AtomicUsize::new(0));

    let push_tx = push.clone();
    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let conn = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let frames_tx = frames_tx.clone();
            let mut pushed = push_tx.subscribe();
            tokio::spawn(async move {
                let ws = accept_async(tcp).await.unwrap();
                let (mut write, mut read) = ws.split();
                loop {
                    tokio::select! {
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                let frame: Value = serde_json::from_str(&text).unwrap();
                                let is_auth = frame["type"] == "auth";
                                let _ = frames_tx.send((conn, frame));
                                if !is_auth {
                                    continue;
                                }
                                let reply = match mode {
                                    Mode::Reject(message) => json!({ "type": "connect_error", "message": message }),
                                    Mode::Accept | Mode::DropFirst => json!({ "type": "connected", "sid": format!("sid-{}", conn) }),
                                };
                                let _ = write.send(Message::Text(reply.to_string().into())).await;
                                if matches!(mode, Mode::DropFirst) && conn == 1 {
                                    let _ = write.send(Message::Close(None)).await;
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                            Some(Ok(_)) => {}
                        },
                        out = pushed.recv() => match out {
                            Ok(text) => {
                                let _ = write.send(Message::Text(text.into())).await;
                            }
                            Err(_) => break,
                        },
                    }
                }
            });
        }
    });

    WsServer {
        url: format!("http://127.0.0.1:{}", port),
        frames,
        push,
        connections,
    }
}

fn ws_config(url: &str) -> RealtimeConfig {
    RealtimeConfig::new(url)
        .with_transports(vec![Transport::WebSocket])
        .with_reconnect_delay(Duration::from_millis(50))
}

fn manager(config: RealtimeConfig, session: Option<Session>) -> ConnectionManager {
    let store = Arc::new(MemoryStore::new());
    if let Some(session) = session {
        session.persist(store.as_ref()).unwrap();
    }
    ConnectionManager::new(config, store).unwrap()
}

#[tokio::test]
async fn connect_without_token_opens_no_channel() {
    let server = spawn_ws_server(Mode::Accept).await;
    let manager = manager(ws_config(&server.url), None);

    assert!(manager.connect(Some("u1")).is_none());
    assert!(manager.get_handle().is_none());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connect_authenticates_and_reuses_handle() {
    let mut server = spawn_ws_server(Mode::Accept).await;
    let manager = manager(ws_config(&server.url), Some(Session::new("u1", "tok")));

    let channel = manager.connect(Some("u1")).unwrap();
    timeout(WAIT, channel.wait_until_open()).await.unwrap().unwrap();

    let auth = server.next_frame("auth").await;
    assert_eq!(auth, json!({ "type": "auth", "token": "tok", "userId": "u1" }));
    assert_eq!(channel.transport(), Some(Transport::WebSocket));

    for _ in 0..3 {
        assert!(manager.get_handle().unwrap().same_channel(&channel));
    }
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);

    manager.disconnect();
    timeout(WAIT, channel.wait_until_closed()).await.unwrap();
    assert!(manager.current().is_none());
}

#[tokio::test]
async fn get_handle_after_disconnect_opens_anonymous_channel() {
    let mut server = spawn_ws_server(Mode::Accept).await;
    let manager = manager(ws_config(&server.url), Some(Session::new("u1", "tok")));

    let first = manager.connect(Some("u1")).unwrap();
    timeout(WAIT, first.wait_until_open()).await.unwrap().unwrap();
    server.next_frame("auth").await;
    manager.disconnect();

    let fallback = manager.get_handle().unwrap();
    assert!(!fallback.same_channel(&first));
    assert_eq!(fallback.user_id(), None);

    let auth = server.next_frame("auth").await;
    assert_eq!(auth, json!({ "type": "auth", "token": "tok" }));
}

#[tokio::test]
async fn connect_error_tears_down_without_retry() {
    let server = spawn_ws_server(Mode::Reject("jwt expired")).await;
    let manager = manager(ws_config(&server.url), Some(Session::new("u1", "tok")));

    let channel = manager.connect(Some("u1")).unwrap();
    timeout(WAIT, channel.wait_until_closed()).await.unwrap();
    assert_eq!(channel.state(), ChannelState::Closed);

    timeout(WAIT, async {
        while manager.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
    assert!(channel.emit("typing", &()).is_err());
}

#[tokio::test]
async fn events_reach_subscribers_until_unsubscribed() {
    let server = spawn_ws_server(Mode::Accept).await;
    let manager = manager(ws_config(&server.url), Some(Session::new("u1", "tok")));
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();

    let channel = manager.connect(Some("u1")).unwrap();
    let messages_tx = tx.clone();
    let messages = manager
        .subscribe("new_message", move |data| {
            let _ = messages_tx.send(("new_message".to_string(), data.clone()));
        })
        .unwrap();
    let _sentinel = manager
        .subscribe("sentinel", move |data| {
            let _ = tx.send(("sentinel".to_string(), data.clone()));
        })
        .unwrap();
    timeout(WAIT, channel.wait_until_open()).await.unwrap().unwrap();

    server.push_event("new_message", json!({ "id": 1 }));
    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received, ("new_message".to_string(), json!({ "id": 1 })));

    assert!(messages.unsubscribe());
    server.push_event("new_message", json!({ "id": 2 }));
    server.push_event("sentinel", json!(null));

    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received.0, "sentinel");
}

#[tokio::test]
async fn emits_reach_server_in_order() {
    let mut server = spawn_ws_server(Mode::Accept).await;
    let manager = manager(ws_config(&server.url), Some(Session::new("u1", "tok")));

    manager.connect(Some("u1")).unwrap();
    for n in 1..=3 {
        manager.emit("typing", &json!({ "n": n })).unwrap();
    }

    for n in 1..=3 {
        let frame = server.next_frame("event").await;
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"]["n"], n);
    }
}

#[tokio::test]
async fn dropped_link_reconnects_and_flushes_queued_emits() {
    let mut server = spawn_ws_server(Mode::DropFirst).await;
    let config = ws_config(&server.url).with_reconnect_delay(Duration::from_millis(300));
    let manager = manager(config, Some(Session::new("u1", "tok")));

    let channel = manager.connect(Some("u1")).unwrap();
    let mut states = channel.state_changes();
    timeout(
        WAIT,
        states.wait_for(|state| *state == ChannelState::Reconnecting { attempt: 1 }),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(channel.transport(), None);

    for n in 0..3 {
        manager.emit("typing", &json!({ "n": n })).unwrap();
    }

    timeout(WAIT, channel.wait_until_open()).await.unwrap().unwrap();
    for n in 0..3 {
        let (conn, frame) = server.next_frame_on("event").await;
        assert_eq!(conn, 2);
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"]["n"], n);
    }
    assert_eq!(server.connections.load(Ordering::SeqCst), 2);
    assert!(manager.get_handle().unwrap().same_channel(&channel));
}

#[tokio::test]
async fn websocket_link_sends_heartbeats() {
    let mut server = spawn_ws_server(Mode::Accept).await;
    let config = ws_config(&server.url).with_heartbeat_interval(Duration::from_millis(50));
    let manager = manager(config, Some(Session::new("u1", "tok")));

    let channel = manager.connect(Some("u1")).unwrap();
    timeout(WAIT, channel.wait_until_open()).await.unwrap().unwrap();

    for _ in 0..2 {
        let ping = server.next_frame("ping").await;
        assert!(ping["timestamp"].as_u64().is_some_and(|ts| ts > 0));
    }
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test]
async fn channel_closes_after_max_reconnect_attempts() {
    // Accepts TCP and hangs up before the WebSocket handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(tcp);
        }
    });

    let config = ws_config(&format!("http://{}", addr))
        .with_reconnect_delay(Duration::from_millis(20))
        .with_max_reconnect_attempts(1);
    let manager = manager(config, Some(Session::new("u1", "tok")));

    let channel = manager.connect(Some("u1")).unwrap();
    timeout(WAIT, channel.wait_until_closed()).await.unwrap();

    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(channel.wait_until_open().await.is_err());
    assert!(manager.emit("typing", &json!({})).is_err());
}

#[derive(Clone, Default)]
struct PollServer {
    auth: Arc<Mutex<Vec<Value>>>,
    sent: Arc<Mutex<Vec<Value>>>,
    queue: Arc<Mutex<Vec<Value>>>,
}

async fn handshake(State(server): State<PollServer>, Json(body): Json<Value>) -> Json<Value> {
    server.auth.lock().unwrap().push(body);
    Json(json!({ "type": "connected", "sid": "poll-1" }))
}

async fn poll(
    State(server): State<PollServer>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    assert_eq!(query.get("sid").map(String::as_str), Some("poll-1"));
    let frames: Vec<Value> = server.queue.lock().unwrap().drain(..).collect();
    Json(Value::Array(frames))
}

async fn send(State(server): State<PollServer>, Json(body): Json<Value>) -> Json<Value> {
    server.sent.lock().unwrap().push(body);
    Json(json!({}))
}

#[tokio::test]
async fn polling_is_used_when_websocket_is_unavailable() {
    let server = PollServer::default();
    let app = Router::new()
        .route("/realtime/handshake", post(handshake))
        .route("/realtime/poll", get(poll))
        .route("/realtime/send", post(send))
        .with_state(server.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let config = RealtimeConfig::new(format!("http://{}", addr))
        .with_transports(vec![Transport::WebSocket, Transport::Polling]);
    let manager = manager(config, Some(Session::new("u1", "tok")));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = manager.connect(Some("u1")).unwrap();
    let _sub = manager
        .subscribe("bid_placed", move |data| {
            let _ = tx.send(data.clone());
        })
        .unwrap();
    timeout(WAIT, channel.wait_until_open()).await.unwrap().unwrap();

    assert_eq!(channel.transport(), Some(Transport::Polling));
    assert_eq!(
        server.auth.lock().unwrap().as_slice(),
        &[json!({ "token": "tok", "userId": "u1" })]
    );

    server
        .queue
        .lock()
        .unwrap()
        .push(json!({ "type": "event", "event": "bid_placed", "data": { "caseId": "c1" } }));
    let data = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(data, json!({ "caseId": "c1" }));

    manager.emit("typing", &json!({ "conversationId": "v1" })).unwrap();
    timeout(WAIT, async {
        while server.sent.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        server.sent.lock().unwrap()[0],
        json!({ "type": "event", "event": "typing", "data": { "conversationId": "v1" } })
    );
}

#[tokio::test]
async fn stored_session_is_read_at_connect_time() {
    let server = spawn_ws_server(Mode::Accept).await;
    let store = Arc::new(MemoryStore::new());
    let manager = ConnectionManager::new(ws_config(&server.url), store.clone()).unwrap();

    assert!(manager.connect(None).is_none());
    store.set("token", "late-token").unwrap();
    let channel = manager.connect(None).unwrap();
    timeout(WAIT, channel.wait_until_open()).await.unwrap().unwrap();
}
