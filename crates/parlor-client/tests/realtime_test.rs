//! Realtime channel against an in-process Socket.IO speaking fake.
//!
//! The fake checks the JWT in the upgrade query, performs the Engine.IO
//! open / Socket.IO connect handshake, greets the client and echoes what it
//! receives the way the chat server does.

use std::time::Duration;

use axum::Router;
use chrono::TimeDelta;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

use parlor_client::types::TokenPair;
use parlor_client::types::events::{ChannelUpdate, ClientEvent, ServerEvent};
use parlor_client::types::{ChatMessage, MembershipState};
use parlor_client::{
    ChannelState, ClientConfig, Error, MemoryTokenStore, RealtimeChannel, SendOutcome, TokenStore,
};

const SECRET: &[u8] = b"realtime-test-secret";
const WAIT: Duration = Duration::from_secs(5);

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

#[derive(Deserialize)]
struct SocketQuery {
    #[serde(rename = "EIO")]
    eio: String,
    transport: String,
    token: String,
}

/// What the fake does once the client is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    /// Greet, then echo events.
    Echo,
    /// Greet, then send an Engine.IO ping.
    Ping,
    /// Greet, then end the Socket.IO session (`41`).
    Kick,
    /// Greet, then close the Engine.IO session (`1`).
    Close,
    /// Accept the upgrade and never send the open packet.
    Silent,
}

#[derive(Clone)]
struct Fake {
    script: Script,
    frames: mpsc::UnboundedSender<String>,
}

async fn upgrade(
    State(fake): State<Fake>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if query.eio != "4" || query.transport != "websocket" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let claims = match decode::<Claims>(&query.token, &DecodingKey::from_secret(SECRET), &Validation::default()) {
        Ok(data) => data.claims,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };
    ws.on_upgrade(move |socket| serve_socket(socket, fake, claims.sub))
}

async fn serve_socket(mut socket: WebSocket, fake: Fake, username: String) {
    if fake.script != Script::Silent {
        let open = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        if socket.send(Message::Text(open.into())).await.is_err() {
            return;
        }
    }

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text.as_str().to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let _ = fake.frames.send(text.clone());
        for reply in respond(&text, &username, fake.script) {
            if socket.send(Message::Text(reply.into())).await.is_err() {
                return;
            }
        }
    }
}

fn respond(frame: &str, username: &str, script: Script) -> Vec<String> {
    if frame == "40" {
        let mut replies = vec![
            r#"40{"sid":"sio-1"}"#.to_string(),
            emit(&ServerEvent::ServerMessage {
                message: "Welcome to the chat server!".into(),
            }),
        ];
        match script {
            Script::Ping => replies.push("2".into()),
            Script::Kick => replies.push("41".into()),
            Script::Close => replies.push("1".into()),
            Script::Echo | Script::Silent => {}
        }
        return replies;
    }

    let Some(body) = frame.strip_prefix("42") else {
        return Vec::new();
    };
    let Ok(args) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let membership = |channel: String, action| {
        ServerEvent::ChannelUpdate(ChannelUpdate {
            channel,
            username: Some(username.to_string()),
            action,
        })
    };
    let reply = match ClientEvent::from_wire(args) {
        Ok(Some(ClientEvent::SendMessage(message))) => ServerEvent::ReceiveMessage(message),
        Ok(Some(ClientEvent::JoinChannel { channel })) => membership(channel, MembershipState::Joined),
        Ok(Some(ClientEvent::LeaveChannel { channel })) => membership(channel, MembershipState::Left),
        _ => return Vec::new(),
    };
    vec![emit(&reply)]
}

fn emit(event: &ServerEvent) -> String {
    format!("42{}", event.to_wire().unwrap())
}

struct Harness {
    config: ClientConfig,
    frames: mpsc::UnboundedReceiver<String>,
}

async fn start_fake() -> Harness {
    start_scripted(Script::Echo).await
}

async fn start_scripted(script: Script) -> Harness {
    let (frames_tx, frames) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/socket.io/", get(upgrade))
        .with_state(Fake {
            script,
            frames: frames_tx,
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = format!("http://{}", addr);
    let mut config = ClientConfig::new(&base, &base).unwrap();
    config.connect_timeout = WAIT;
    Harness { config, frames }
}

fn store_for(username: &str) -> MemoryTokenStore {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    let access_token = encode(
        &Header::default(),
        &Claims {
            sub: username.to_string(),
            exp,
        },
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();
    let tokens = TokenPair {
        access_token,
        refresh_token: "refresh".into(),
    };
    MemoryTokenStore::with_tokens(tokens, TimeDelta::hours(1))
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(WAIT, frames.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("fake server gone")
}

/// Connect as `username` and consume the greeting.
async fn connected(
    harness: &Harness,
    username: &str,
) -> (RealtimeChannel, mpsc::UnboundedReceiver<ServerEvent>) {
    let mut channel = RealtimeChannel::new(&harness.config);
    let mut events = channel.connect(&store_for(username)).unwrap();
    channel.wait_connected().await.unwrap();
    assert!(matches!(next_event(&mut events).await, ServerEvent::ServerMessage { .. }));
    (channel, events)
}

#[tokio::test]
async fn missing_token_never_connects() {
    let harness = start_fake().await;
    let mut channel = RealtimeChannel::new(&harness.config);

    let err = channel.connect(&MemoryTokenStore::default()).unwrap_err();
    assert!(matches!(err, Error::MissingAccessToken));
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn sending_before_connect_is_rejected() {
    let harness = start_fake().await;
    let channel = RealtimeChannel::new(&harness.config);

    let err = channel
        .send_message(ChatMessage::new("ada", "hello"))
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[tokio::test]
async fn connect_reaches_connected_and_receives_greeting() {
    let mut harness = start_fake().await;
    let mut channel = RealtimeChannel::new(&harness.config);

    let mut events = channel.connect(&store_for("ada")).unwrap();
    assert_eq!(channel.state(), ChannelState::Connecting);
    assert!(matches!(channel.connect(&store_for("ada")), Err(Error::AlreadyConnected)));

    channel.wait_connected().await.unwrap();
    assert_eq!(channel.state(), ChannelState::Connected);
    assert_eq!(next_frame(&mut harness.frames).await, "40");

    match next_event(&mut events).await {
        ServerEvent::ServerMessage { message } => assert_eq!(message, "Welcome to the chat server!"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn blank_messages_are_not_emitted() {
    let mut harness = start_fake().await;
    let (channel, mut events) = connected(&harness, "ada").await;
    assert_eq!(next_frame(&mut harness.frames).await, "40");

    let outcome = channel.send_message(ChatMessage::new("ada", "   ")).unwrap();
    assert_eq!(outcome, SendOutcome::Skipped);
    let outcome = channel.send_message(ChatMessage::new("ada", "hi")).unwrap();
    assert_eq!(outcome, SendOutcome::Sent);

    // The first frame after the handshake is the real message.
    let frame = next_frame(&mut harness.frames).await;
    assert!(frame.starts_with(r#"42["send_message""#), "{frame}");
    assert!(frame.contains(r#""message":"hi""#), "{frame}");

    match next_event(&mut events).await {
        ServerEvent::ReceiveMessage(msg) => assert_eq!(msg, ChatMessage::new("ada", "hi")),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn messages_arrive_in_send_order() {
    let harness = start_fake().await;
    let (channel, mut events) = connected(&harness, "ada").await;

    channel.send_message(ChatMessage::new("ada", "one")).unwrap();
    channel.send_message(ChatMessage::new("ada", "two")).unwrap();

    let mut received = Vec::new();
    for _ in 0..2 {
        match next_event(&mut events).await {
            ServerEvent::ReceiveMessage(msg) => received.push(msg.message),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(received, ["one", "two"]);
}

#[tokio::test]
async fn join_and_leave_track_membership() {
    let harness = start_fake().await;
    let (mut channel, mut events) = connected(&harness, "ada").await;

    channel.join_channel("rust").unwrap();
    assert!(channel.is_member("rust"));
    match next_event(&mut events).await {
        ServerEvent::ChannelUpdate(update) => {
            assert_eq!(update.channel, "rust");
            assert_eq!(update.username.as_deref(), Some("ada"));
            assert_eq!(update.action, MembershipState::Joined);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    channel.leave_channel("rust").unwrap();
    assert!(!channel.is_member("rust"));
    match next_event(&mut events).await {
        ServerEvent::ChannelUpdate(update) => assert_eq!(update.action, MembershipState::Left),
        other => panic!("unexpected event: {other:?}"),
    }

    let memberships = channel.memberships();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].state, MembershipState::Left);
}

#[tokio::test]
async fn disconnect_says_goodbye() {
    let mut harness = start_fake().await;
    let (mut channel, mut events) = connected(&harness, "ada").await;
    assert_eq!(next_frame(&mut harness.frames).await, "40");

    channel.disconnect().await;
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(next_frame(&mut harness.frames).await, "41");

    // The socket task is gone, so the event stream ends.
    let end = timeout(WAIT, events.recv()).await.unwrap();
    assert!(end.is_none());
    assert!(matches!(
        channel.send_message(ChatMessage::new("ada", "late")),
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn rejected_token_ends_disconnected() {
    let harness = start_fake().await;
    let mut channel = RealtimeChannel::new(&harness.config);

    let store = MemoryTokenStore::default();
    store
        .save(&TokenPair {
            access_token: "not-a-jwt".into(),
            refresh_token: "refresh".into(),
        })
        .unwrap();

    let mut events = channel.connect(&store).unwrap();
    assert!(channel.wait_connected().await.is_err());
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn pings_are_answered_with_pongs() {
    let mut harness = start_scripted(Script::Ping).await;
    let (_channel, _events) = connected(&harness, "ada").await;

    assert_eq!(next_frame(&mut harness.frames).await, "40");
    assert_eq!(next_frame(&mut harness.frames).await, "3");
}

#[tokio::test]
async fn dropping_the_channel_closes_the_socket() {
    let mut harness = start_fake().await;
    let (channel, mut events) = connected(&harness, "ada").await;
    assert_eq!(next_frame(&mut harness.frames).await, "40");

    drop(channel);
    assert_eq!(next_frame(&mut harness.frames).await, "41");
    assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
}

async fn assert_server_ends_session(script: Script) {
    let harness = start_scripted(script).await;
    let mut channel = RealtimeChannel::new(&harness.config);
    let mut events = channel.connect(&store_for("ada")).unwrap();

    // The greeting is delivered, then the stream ends with no reconnect.
    assert!(matches!(next_event(&mut events).await, ServerEvent::ServerMessage { .. }));
    assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(matches!(
        channel.send_message(ChatMessage::new("ada", "anyone?")),
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn server_disconnect_ends_the_stream() {
    assert_server_ends_session(Script::Kick).await;
}

#[tokio::test]
async fn engine_close_ends_the_stream() {
    assert_server_ends_session(Script::Close).await;
}

#[tokio::test]
async fn handshake_shares_one_connect_deadline() {
    let mut harness = start_scripted(Script::Silent).await;
    harness.config.connect_timeout = Duration::from_millis(300);
    let mut channel = RealtimeChannel::new(&harness.config);

    let mut events = channel.connect(&store_for("ada")).unwrap();
    // The socket task gives up on its own before the waiter's grace runs out.
    assert!(matches!(channel.wait_connected().await, Err(Error::NotConnected)));
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
}
