use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use parlor_types::events::{ClientEvent, ServerEvent};
use parlor_types::{ChannelMembership, ChatMessage, MembershipState};

use super::codec::{EnginePacket, SocketPacket};
use super::{ChannelState, SendOutcome, socket_endpoint};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::token_store::TokenStore;

/// How long `disconnect` waits for the socket task to say goodbye.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

enum Command {
    Emit(ClientEvent),
    Close,
}

/// Handle to the background task that owns the socket.
struct Link {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Client side of the realtime chat socket.
///
/// Created disconnected; `connect` spawns a task that owns the WebSocket and
/// returns the receiver on which inbound [`ServerEvent`]s arrive, in the
/// order the server delivered them. Dropping the channel closes the socket.
pub struct RealtimeChannel {
    socket_url: Url,
    connect_timeout: Duration,
    state: Arc<watch::Sender<ChannelState>>,
    link: Option<Link>,
    memberships: BTreeMap<String, MembershipState>,
}

impl RealtimeChannel {
    pub fn new(config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            socket_url: config.socket_url.clone(),
            connect_timeout: config.connect_timeout,
            state: Arc::new(state),
            link: None,
            memberships: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Disconnected → Connecting. The access token is read from `store` now
    /// and sent with the upgrade request; without one nothing touches the
    /// network.
    pub fn connect(&mut self, store: &dyn TokenStore) -> Result<mpsc::UnboundedReceiver<ServerEvent>> {
        if self.state() != ChannelState::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        let token = store.access_token()?.ok_or(Error::MissingAccessToken)?;
        let url = socket_endpoint(&self.socket_url, &token)?;

        // A previous link whose socket already dropped.
        if let Some(stale) = self.link.take() {
            stale.task.abort();
        }

        self.state.send_replace(ChannelState::Connecting);
        self.memberships.clear();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = self.state.clone();
        // One budget for opening the socket and both handshakes.
        let deadline = Instant::now() + self.connect_timeout;

        info!("Connecting to realtime server at {}", self.socket_url);
        let task = tokio::spawn(async move {
            if let Err(e) = run_socket(url, deadline, &state, command_rx, &event_tx).await {
                warn!("Realtime connection ended: {}", e);
            }
            state.send_replace(ChannelState::Disconnected);
            // The event stream ends only once the state says Disconnected.
            drop(event_tx);
        });

        self.link = Some(Link {
            commands: command_tx,
            task,
        });
        Ok(event_rx)
    }

    /// Wait for the handshake to settle. `Ok` once Connected; an error if
    /// the attempt ended Disconnected or the connect timeout passed.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        // The socket task settles by its own deadline; the grace only
        // covers a task that died without reporting.
        let settled = timeout(
            self.connect_timeout + CLOSE_GRACE,
            rx.wait_for(|s| *s != ChannelState::Connecting),
        )
        .await;
        match settled {
            Ok(Ok(state)) if *state == ChannelState::Connected => Ok(()),
            Ok(_) => Err(Error::NotConnected),
            Err(_) => Err(Error::Protocol("timed out waiting for handshake".into())),
        }
    }

    /// Emit a raw client event. Only valid while Connected.
    pub fn send(&self, event: ClientEvent) -> Result<()> {
        if self.state() != ChannelState::Connected {
            return Err(Error::NotConnected);
        }
        let link = self.link.as_ref().ok_or(Error::NotConnected)?;
        link.commands
            .send(Command::Emit(event))
            .map_err(|_| Error::NotConnected)
    }

    /// Post a chat message. Blank messages are dropped before anything is
    /// emitted.
    pub fn send_message(&self, message: ChatMessage) -> Result<SendOutcome> {
        if message.is_blank() {
            debug!("Skipping blank message from {}", message.username);
            return Ok(SendOutcome::Skipped);
        }
        self.send(ClientEvent::SendMessage(message))?;
        Ok(SendOutcome::Sent)
    }

    pub fn join_channel(&mut self, channel: &str) -> Result<()> {
        self.send(ClientEvent::JoinChannel {
            channel: channel.to_string(),
        })?;
        self.memberships
            .insert(channel.to_string(), MembershipState::Joined);
        Ok(())
    }

    pub fn leave_channel(&mut self, channel: &str) -> Result<()> {
        self.send(ClientEvent::LeaveChannel {
            channel: channel.to_string(),
        })?;
        self.memberships
            .insert(channel.to_string(), MembershipState::Left);
        Ok(())
    }

    pub fn is_member(&self, channel: &str) -> bool {
        self.memberships.get(channel) == Some(&MembershipState::Joined)
    }

    /// Channels joined or left on this connection, by name.
    pub fn memberships(&self) -> Vec<ChannelMembership> {
        self.memberships
            .iter()
            .map(|(channel, state)| ChannelMembership {
                channel: channel.clone(),
                state: *state,
            })
            .collect()
    }

    /// Connected/Connecting → Disconnected. Sends the Socket.IO disconnect
    /// packet if the socket is still up, then waits briefly for the task.
    pub async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            let _ = link.commands.send(Command::Close);
            let mut task = link.task;
            if timeout(CLOSE_GRACE, &mut task).await.is_err() {
                warn!("Realtime task did not stop in time, aborting");
                task.abort();
            }
        }
        self.memberships.clear();
        self.state.send_replace(ChannelState::Disconnected);
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        // The task closes the socket on its own; the handshake phase is
        // bounded by the connect timeout.
        if let Some(link) = self.link.take() {
            let _ = link.commands.send(Command::Close);
        }
        self.state.send_replace(ChannelState::Disconnected);
    }
}

// ── Socket task ─────────────────────────────────────────────────────────

async fn run_socket(
    url: Url,
    deadline: Instant,
    state: &watch::Sender<ChannelState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ServerEvent>,
) -> Result<()> {
    let (ws, _) = timeout_at(deadline, connect_async(url.as_str()))
        .await
        .map_err(|_| Error::Protocol("timed out opening socket".into()))??;
    let (mut sink, mut stream) = ws.split();

    let handshake = match timeout_at(deadline, next_engine_packet(&mut stream))
        .await
        .map_err(|_| Error::Protocol("timed out waiting for open packet".into()))??
    {
        Some(EnginePacket::Open(handshake)) => handshake,
        Some(other) => {
            return Err(Error::Protocol(format!("expected open packet, got {:?}", other)));
        }
        None => return Err(Error::Protocol("socket closed during handshake".into())),
    };
    debug!("Engine.IO session {} (ping every {} ms)", handshake.sid, handshake.ping_interval);

    send_packet(&mut sink, SocketPacket::connect().into_engine()).await?;

    let window = handshake.liveness_window();
    // Until the Socket.IO ack arrives the connect deadline still applies.
    let liveness = tokio::time::sleep_until(deadline);
    tokio::pin!(liveness);
    let mut connected = false;

    loop {
        tokio::select! {
            packet = next_engine_packet(&mut stream) => {
                let Some(packet) = packet? else {
                    info!("Realtime server closed the socket");
                    return Ok(());
                };
                match packet {
                    EnginePacket::Ping(data) => {
                        if connected {
                            liveness.as_mut().reset(Instant::now() + window);
                        }
                        send_packet(&mut sink, EnginePacket::Pong(data)).await?;
                    }
                    EnginePacket::Close => {
                        info!("Realtime server closed the session");
                        return Ok(());
                    }
                    EnginePacket::Message(payload) => {
                        match SocketPacket::decode(&payload) {
                            Ok(SocketPacket::Connect { .. }) if !connected => {
                                connected = true;
                                liveness.as_mut().reset(Instant::now() + window);
                                state.send_replace(ChannelState::Connected);
                                info!("Realtime channel connected");
                            }
                            Ok(SocketPacket::Event { args, .. }) => dispatch(args, events),
                            Ok(SocketPacket::Disconnect { .. }) => {
                                info!("Realtime server disconnected this client");
                                return Ok(());
                            }
                            Ok(SocketPacket::ConnectError { data, .. }) => {
                                let reason = data
                                    .as_ref()
                                    .and_then(|d| d.get("message"))
                                    .and_then(|m| m.as_str())
                                    .unwrap_or("no reason given")
                                    .to_string();
                                return Err(Error::Protocol(format!("connection refused: {}", reason)));
                            }
                            Ok(other) => debug!("Ignoring {:?}", other),
                            Err(e) => warn!("Dropping undecodable packet: {}", e),
                        }
                    }
                    EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Emit(event)) => {
                        let args = event.to_wire()?;
                        debug!("Emitting {}", event.name());
                        send_packet(&mut sink, SocketPacket::event(args).into_engine()).await?;
                    }
                    Some(Command::Close) | None => {
                        if connected {
                            let _ = send_packet(&mut sink, SocketPacket::disconnect().into_engine()).await;
                        }
                        let _ = sink.send(Message::Close(None)).await;
                        info!("Realtime channel closed");
                        return Ok(());
                    }
                }
            }
            _ = &mut liveness => {
                if !connected {
                    return Err(Error::Protocol("timed out waiting for handshake".into()));
                }
                return Err(Error::Protocol("server stopped sending pings".into()));
            }
        }
    }
}

/// Hand a decoded event to the view. Unknown names and bad payloads are
/// logged and dropped; a gone receiver just means the view stopped reading.
fn dispatch(args: serde_json::Value, events: &mpsc::UnboundedSender<ServerEvent>) {
    match ServerEvent::from_wire(args) {
        Ok(Some(event)) => {
            if events.send(event).is_err() {
                debug!("Event receiver dropped, discarding event");
            }
        }
        Ok(None) => debug!("Ignoring unknown server event"),
        Err(e) => warn!("Malformed server event: {}", e),
    }
}

/// Next Engine.IO packet from the socket, skipping WebSocket control frames
/// and undecodable text. `None` when the socket is closed.
async fn next_engine_packet(stream: &mut SplitStream<WsStream>) -> Result<Option<EnginePacket>> {
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => match EnginePacket::decode(&text) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => warn!("Dropping bad Engine.IO frame: {}", e),
            },
            Message::Close(_) => return Ok(None),
            // Pings are answered by tungstenite; binary frames carry nothing we use.
            _ => {}
        }
    }
    Ok(None)
}

async fn send_packet(sink: &mut WsSink, packet: EnginePacket) -> Result<()> {
    sink.send(Message::Text(packet.encode())).await?;
    Ok(())
}
