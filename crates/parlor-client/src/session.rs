//! The signed-in user's context.
//!
//! A `Session` is created once per front-end, handed to each view, filled in
//! after login and emptied on logout. It replaces per-view copies of the
//! profile.

use std::sync::Arc;

use tracing::{info, warn};

use parlor_types::api::LoginRequest;
use parlor_types::{TokenPair, UserProfile};

use crate::auth::AuthClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::guard::{Navigation, RouteGuard};
use crate::http::ApiTransport;
use crate::messages::MessageClient;
use crate::profile::ProfileClient;
use crate::realtime::RealtimeChannel;
use crate::token_store::TokenStore;

pub struct Session {
    config: Arc<ClientConfig>,
    store: Arc<dyn TokenStore>,
    auth: AuthClient,
    profiles: ProfileClient,
    messages: MessageClient,
    guard: RouteGuard,
    profile: Option<UserProfile>,
}

impl Session {
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let config = Arc::new(config);
        let transport = ApiTransport::new(config.clone(), store.clone())?;
        Ok(Self {
            auth: AuthClient::from_transport(transport.clone()),
            profiles: ProfileClient::from_transport(transport.clone()),
            messages: MessageClient::from_transport(transport),
            guard: RouteGuard::default(),
            config,
            store,
            profile: None,
        })
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn profiles(&self) -> &ProfileClient {
        &self.profiles
    }

    pub fn messages(&self) -> &MessageClient {
        &self.messages
    }

    /// Profile fetched at login (or by the last `refresh_profile`).
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn navigate(&self, path: &str) -> Result<Navigation> {
        self.guard.check(path, self.store.as_ref())
    }

    /// Log in, persist the tokens, then load the profile once.
    ///
    /// Tokens are stored only after the server accepts the credentials. If
    /// the follow-up profile fetch fails the user stays logged in and the
    /// error is returned.
    pub async fn login(&mut self, credentials: &LoginRequest) -> Result<&UserProfile> {
        let tokens: TokenPair = self.auth.login(credentials).await?;
        self.store.save(&tokens)?;
        self.refresh_profile().await
    }

    pub async fn refresh_profile(&mut self) -> Result<&UserProfile> {
        let profile = self.profiles.get_profile().await?;
        Ok(&*self.profile.insert(profile))
    }

    /// Revoke the refresh token server-side, then forget everything local.
    ///
    /// Without a stored refresh token this fails immediately and the server
    /// is never contacted. If the server rejects the logout the tokens are
    /// kept so the user can retry.
    pub async fn logout(&mut self) -> Result<()> {
        let refresh = self.store.refresh_token()?.ok_or(Error::RefreshTokenNotFound)?;
        let resp = self.auth.logout(&refresh).await?;
        self.store.clear()?;
        self.profile = None;
        info!("Logged out: {}", resp.message);
        Ok(())
    }

    /// Drop local state without telling the server, e.g. after the server
    /// starts rejecting an expired token.
    pub fn invalidate(&mut self) -> Result<()> {
        warn!("Discarding local session");
        self.profile = None;
        self.store.clear()
    }

    /// A fresh, disconnected realtime channel bound to this session's
    /// socket URL. Connect it with [`RealtimeChannel::connect`].
    pub fn realtime(&self) -> RealtimeChannel {
        RealtimeChannel::new(&self.config)
    }
}
