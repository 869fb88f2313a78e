use std::fmt;

use serde::{Deserialize, Serialize};

/// Bearer credentials returned by a successful login.
///
/// Both tokens are opaque to the client. The access token authenticates
/// every REST call and the realtime connection; the refresh token is only
/// ever sent back at logout.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl UserProfile {
    /// Initials shown when no avatar image is available.
    pub fn initials(&self) -> String {
        self.username
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .collect()
    }
}

/// A chat line as broadcast by the server.
///
/// Messages carry no identifier: duplicates and reordering are possible and
/// are shown exactly as delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
            channel: None,
        }
    }

    pub fn in_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// True when the body has nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Joined,
    Left,
}

/// Per-connection record of a channel the client joined or left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMembership {
    pub channel: String,
    pub state: MembershipState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_debug_hides_secrets() {
        let pair = TokenPair {
            access_token: "abc.def.ghi".into(),
            refresh_token: "jkl.mno.pqr".into(),
        };
        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("abc.def.ghi"));
        assert!(!rendered.contains("jkl.mno.pqr"));
    }

    #[test]
    fn profile_tolerates_extra_fields_and_null_image() {
        let json = r#"{"id":7,"username":"ada lovelace","email":"ada@example.com","image_url":null,"last_seen":"Mon"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.username, "ada lovelace");
        assert_eq!(profile.image_url, None);
        assert_eq!(profile.initials(), "al");
    }

    #[test]
    fn blank_message_detection() {
        assert!(ChatMessage::new("a", "   \t\n").is_blank());
        assert!(!ChatMessage::new("a", " hi ").is_blank());
    }

    #[test]
    fn channel_is_omitted_when_absent() {
        let json = serde_json::to_string(&ChatMessage::new("a", "hi")).unwrap();
        assert_eq!(json, r#"{"username":"a","message":"hi"}"#);
    }
}
