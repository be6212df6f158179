//! Shared helpers for hub integration tests.

#![allow(dead_code)]

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use presence_hub::config::HubConfig;
use presence_hub::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWrite = SplitSink<WsStream, Message>;
pub type WsRead = SplitStream<WsStream>;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    /// Same state the router holds; lets tests look inside the registry.
    pub state: AppState,
}

/// Start the server on a random port.
pub async fn start_test_server() -> TestServer {
    start_test_server_with(HubConfig::default()).await
}

/// Start the server on a random port with custom keepalive settings.
pub async fn start_test_server_with(hub_config: HubConfig) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = presence_hub::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = presence_hub::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState::new(db, jwt_secret, hub_config);

    let app = presence_hub::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    TestServer {
        addr,
        base_url: format!("http://{}", addr),
        state,
    }
}

pub fn token_for(server: &TestServer, user_id: &str) -> String {
    token_with_ttl(server, user_id, 3600)
}

/// A token that expired (or expires) `ttl_secs` from now.
pub fn token_with_ttl(server: &TestServer, user_id: &str, ttl_secs: i64) -> String {
    presence_hub::auth::jwt::issue_access_token(
        &server.state.jwt_secret,
        user_id,
        &format!("{}@test.com", user_id),
        ttl_secs,
    )
    .expect("Failed to issue token")
}

/// Read until the server closes the socket and return the close code.
pub async fn next_close_code(read: &mut WsRead, within: Duration) -> u16 {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let msg = tokio::time::timeout_at(deadline, read.next())
            .await
            .expect("Timed out waiting for close frame");

        match msg {
            Some(Ok(Message::Close(Some(frame)))) => return frame.code.into(),
            Some(Ok(Message::Close(None))) => panic!("Close frame without a code"),
            Some(Ok(_)) => {}
            other => panic!("Connection ended without a close frame: {:?}", other),
        }
    }
}

async fn connect(url: &str) -> (WsWrite, WsRead) {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("Failed to connect to hub");
    ws_stream.split()
}

/// Connect to the presence hub as `user_id`.
pub async fn connect_presence(server: &TestServer, user_id: &str) -> (WsWrite, WsRead) {
    let url = format!(
        "ws://{}/hubs/presence?access_token={}",
        server.addr,
        token_for(server, user_id)
    );
    connect(&url).await
}

/// Connect to the message hub as `user_id`, viewing the conversation with `other_user_id`.
pub async fn connect_message(
    server: &TestServer,
    user_id: &str,
    other_user_id: &str,
) -> (WsWrite, WsRead) {
    let url = format!(
        "ws://{}/hubs/message?access_token={}&userId={}",
        server.addr,
        token_for(server, user_id),
        other_user_id
    );
    connect(&url).await
}

/// Read frames until one matches `predicate`, or panic after `EVENT_TIMEOUT`.
async fn next_frame_where<F>(read: &mut WsRead, what: &str, predicate: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let msg = tokio::time::timeout_at(deadline, read.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {}", what));

        match msg {
            Some(Ok(Message::Text(text))) => {
                let frame: Value = serde_json::from_str(text.as_str()).expect("Frame is JSON");
                if predicate(&frame) {
                    return frame;
                }
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            other => panic!("Connection ended while waiting for {}: {:?}", what, other),
        }
    }
}

/// Wait for the next server event named `target` and return its first argument.
pub async fn next_event(read: &mut WsRead, target: &str) -> Value {
    let frame = next_frame_where(read, target, |f| {
        f["type"] == "invocation" && f["target"] == target
    })
    .await;
    frame["arguments"][0].clone()
}

/// Wait for the completion of invocation `invocation_id`.
pub async fn next_completion(read: &mut WsRead, invocation_id: &str) -> Value {
    next_frame_where(read, "completion", |f| {
        f["type"] == "completion" && f["invocationId"] == invocation_id
    })
    .await
}

/// Assert that no event named `target` arrives within `within`.
pub async fn expect_no_event(read: &mut WsRead, target: &str, within: Duration) {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        match tokio::time::timeout_at(deadline, read.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => {
                let frame: Value = serde_json::from_str(text.as_str()).expect("Frame is JSON");
                assert!(
                    frame["target"] != target,
                    "Unexpected {} event: {}",
                    target,
                    frame
                );
            }
            Ok(Some(Ok(_))) => {}
            Ok(other) => panic!("Connection ended while watching for {}: {:?}", target, other),
        }
    }
}

/// Invoke a hub method.
pub async fn invoke(write: &mut WsWrite, invocation_id: &str, target: &str, argument: Value) {
    let frame = json!({
        "type": "invocation",
        "invocationId": invocation_id,
        "target": target,
        "arguments": [argument],
    });
    write
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send invocation");
}

/// Poll `condition` until it holds, or panic after `EVENT_TIMEOUT`.
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    eventually_within(what, EVENT_TIMEOUT, condition).await;
}

/// Poll `condition` until it holds, or panic after `within`.
pub async fn eventually_within<F>(what: &str, within: Duration, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting until {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
