use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_SOCKET_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TOKEN_PATH: &str = ".parlor/tokens.json";

/// Stored tokens expire after one day, like the browser cookies they replace.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// How long the realtime channel waits for the Socket.IO handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `https://chat.example.com/api`.
    pub api_url: Url,
    /// Base URL of the realtime server. `http(s)` is rewritten to `ws(s)`.
    pub socket_url: Url,
    pub token_path: PathBuf,
    pub token_ttl: TimeDelta,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            socket_url: Url::parse(DEFAULT_SOCKET_URL).expect("default socket URL is valid"),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            token_ttl: TimeDelta::hours(DEFAULT_TOKEN_TTL_HOURS),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("parlor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: &str, socket_url: &str) -> Result<Self> {
        Ok(Self {
            api_url: Url::parse(api_url)?,
            socket_url: Url::parse(socket_url)?,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("API", &self.api_url), ("socket", &self.socket_url)] {
            if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
                return Err(Error::Config(format!(
                    "{} URL must use http(s) or ws(s), got '{}'",
                    name,
                    url.scheme()
                )));
            }
        }
        if self.token_ttl <= TimeDelta::zero() {
            return Err(Error::Config("token TTL must be positive".into()));
        }
        Ok(())
    }

    /// Absolute URL for an API path such as `auth/login`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        join_path(&self.api_url, path)
    }
}

/// Append `path` to `base` without dropping the base's last segment, which
/// is what `Url::join` does when the base has no trailing slash.
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}
