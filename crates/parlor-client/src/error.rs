/// Result type for every fallible operation in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure: DNS, TLS, connection reset.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status. `message` is the
    /// server's own explanation when it sent one, otherwise a fixed
    /// per-operation fallback.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("access token not found")]
    MissingAccessToken,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("realtime channel is not connected")]
    NotConnected,

    #[error("realtime channel is already connected")]
    AlreadyConnected,

    #[error("realtime protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// True for failures caused by a missing credential rather than by the
    /// server or the network.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingAccessToken | Self::RefreshTokenNotFound)
    }
}
