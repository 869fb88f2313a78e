//! Shared wire types for the Parlor chat client.
//!
//! `api` holds the REST request/response bodies, `events` the realtime
//! events exchanged over the socket, `models` the entities both sides use.

pub mod api;
pub mod events;
pub mod models;

pub use models::{ChannelMembership, ChatMessage, MembershipState, TokenPair, UserProfile};
