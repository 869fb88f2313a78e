//! Realtime chat channel.
//!
//! One long-lived socket per chat view, authenticated by the access token in
//! the connect URL. The channel is an explicit state machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --handshake ack--> Connected
//!      ^                        |                             |
//!      +---- disconnect / drop / server close / error --------+
//! ```
//!
//! There is no reconnection policy. Once the socket drops the channel stays
//! `Disconnected` until the owner calls `connect` again.

pub mod channel;
pub mod codec;

use std::fmt;

use url::Url;

use crate::config::join_path;
use crate::error::{Error, Result};

pub use channel::RealtimeChannel;

/// Engine.IO protocol revision spoken by the chat server.
pub const ENGINE_IO_VERSION: &str = "4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// What happened to a message handed to [`RealtimeChannel::send_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for emission on the socket.
    Sent,
    /// Empty or whitespace-only; nothing was emitted.
    Skipped,
}

/// WebSocket URL for the Socket.IO endpoint under `base`, carrying the
/// access token as the `token` query parameter.
pub fn socket_endpoint(base: &Url, access_token: &str) -> Result<Url> {
    let mut url = join_path(base, "socket.io/")?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::Config(format!("unsupported socket scheme '{}'", other)));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Config(format!("cannot switch socket URL to {}", scheme)))?;
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket")
        .append_pair("token", access_token);
    Ok(url)
}
