use std::sync::Arc;

use tracing::info;

use parlor_types::TokenPair;
use parlor_types::api::{
    ForgotPasswordRequest, LoginRequest, LogoutRequest, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest,
};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{ApiTransport, Failure};
use crate::token_store::TokenStore;

const REGISTER_FAILED: Failure = Failure::message("Registration failed");
const LOGIN_FAILED: Failure = Failure::message("Login failed");
const LOGOUT_FAILED: Failure = Failure::message("Logout failed");
const FORGOT_FAILED: Failure = Failure::message("Forgot password request failed");
const RESET_FAILED: Failure = Failure::message("Password reset failed");

/// Stateless wrapper around the `/auth` routes.
///
/// Each method issues exactly one request. There is no retry: submitting
/// twice sends twice.
#[derive(Clone)]
pub struct AuthClient {
    transport: ApiTransport,
}

impl AuthClient {
    pub fn new(config: Arc<ClientConfig>, store: Arc<dyn TokenStore>) -> Result<Self> {
        Ok(Self::from_transport(ApiTransport::new(config, store)?))
    }

    pub(crate) fn from_transport(transport: ApiTransport) -> Self {
        Self { transport }
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        let url = self.transport.endpoint("auth/register")?;
        let builder = self.transport.http().post(url).json(req);
        let resp: RegisterResponse = self.transport.send_json(builder, REGISTER_FAILED).await?;
        info!("Registered {}", resp.user.username);
        Ok(resp)
    }

    /// Exchange credentials for a token pair. Does not persist anything;
    /// storing the pair is the caller's decision.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<TokenPair> {
        let url = self.transport.endpoint("auth/login")?;
        let builder = self.transport.http().post(url).json(credentials);
        let tokens: TokenPair = self.transport.send_json(builder, LOGIN_FAILED).await?;
        info!("{} logged in", credentials.username);
        Ok(tokens)
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<MessageResponse> {
        if refresh_token.is_empty() {
            return Err(Error::RefreshTokenNotFound);
        }
        let url = self.transport.endpoint("auth/logout")?;
        let body = LogoutRequest {
            refresh_token: refresh_token.to_string(),
        };
        let builder = self.transport.http().post(url).json(&body);
        self.transport.send_json(builder, LOGOUT_FAILED).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse> {
        let url = self.transport.endpoint("auth/forgot-password")?;
        let body = ForgotPasswordRequest {
            email: email.to_string(),
        };
        let builder = self.transport.http().post(url).json(&body);
        self.transport.send_json(builder, FORGOT_FAILED).await
    }

    /// `token` is the one-time reset token from the emailed link. It is sent
    /// as a single escaped path segment.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<MessageResponse> {
        let mut url = self.transport.endpoint("auth/reset-password")?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("API URL cannot carry a path".into()))?
            .push(token);
        let body = ResetPasswordRequest {
            new_password: new_password.to_string(),
        };
        let builder = self.transport.http().post(url).json(&body);
        self.transport.send_json(builder, RESET_FAILED).await
    }
}
