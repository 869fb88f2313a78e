use tracing::debug;

use crate::error::Result;
use crate::token_store::TokenStore;

pub const LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_PROTECTED: [&str; 3] = ["/", "/main", "/profile"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allow,
    Redirect(String),
}

/// Gatekeeper for protected views.
///
/// Only checks that an access token is present. Signature and expiry are the
/// server's concern; a stale token passes here and fails on the first call.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected: Vec<String>,
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED, LOGIN_PATH)
    }
}

impl RouteGuard {
    pub fn new<I, S>(protected: I, login_path: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: protected.into_iter().map(Into::into).collect(),
            login_path: login_path.into(),
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        let path = normalize(path);
        self.protected.iter().any(|p| normalize(p) == path)
    }

    pub fn check(&self, path: &str, store: &dyn TokenStore) -> Result<Navigation> {
        if !self.is_protected(path) || store.access_token()?.is_some() {
            return Ok(Navigation::Allow);
        }
        debug!("No access token for {}, redirecting to {}", path, self.login_path);
        Ok(Navigation::Redirect(self.login_path.clone()))
    }
}

// "/main/" and "/main?x=1" guard the same view as "/main".
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
