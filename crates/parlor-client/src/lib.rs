//! Parlor client library.
//!
//! Wraps the chat backend's REST API (auth, profile, message history) and
//! its realtime socket. Every authenticated call reads the access token from
//! a [`TokenStore`]; nothing else is shared between calls.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod messages;
pub mod profile;
pub mod realtime;
pub mod session;
pub mod token_store;

mod http;

pub use auth::AuthClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use guard::{Navigation, RouteGuard};
pub use messages::MessageClient;
pub use profile::{ImageUpload, ProfileClient};
pub use realtime::{ChannelState, RealtimeChannel, SendOutcome};
pub use session::Session;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};

pub use parlor_types as types;
