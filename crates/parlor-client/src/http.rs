use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use parlor_types::api::ErrorBody;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::token_store::TokenStore;

/// Which field of a failure body carries the server's explanation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ErrorField {
    /// Auth routes: `{"message": ...}`
    Message,
    /// User and message routes: `{"error": ...}`
    Error,
}

/// How a failed call is reported: the field to read and the fallback text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Failure {
    pub field: ErrorField,
    pub fallback: &'static str,
}

impl Failure {
    pub const fn message(fallback: &'static str) -> Self {
        Self {
            field: ErrorField::Message,
            fallback,
        }
    }

    pub const fn error(fallback: &'static str) -> Self {
        Self {
            field: ErrorField::Error,
            fallback,
        }
    }
}

/// HTTP plumbing shared by the REST clients: one connection pool, one
/// config, one token store.
#[derive(Clone)]
pub(crate) struct ApiTransport {
    http: Client,
    config: Arc<ClientConfig>,
    store: Arc<dyn TokenStore>,
}

impl ApiTransport {
    pub fn new(config: Arc<ClientConfig>, store: Arc<dyn TokenStore>) -> Result<Self> {
        let http = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self { http, config, store })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.config.endpoint(path)
    }

    /// Attach `Authorization: Bearer <access>` from the store. Fails before
    /// any network activity if no token is stored.
    pub fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.store.access_token()?.ok_or(Error::MissingAccessToken)?;
        Ok(builder.bearer_auth(token))
    }

    /// Send the request and decode a JSON success body, mapping every failure
    /// to the uniform error shape.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        failure: Failure,
    ) -> Result<T> {
        let response = match builder.send().await {
            Ok(response) => response,
            // URLs can carry a reset token; keep them out of logs and errors.
            Err(e) => {
                let e = e.without_url();
                error!("{}: {}", failure.fallback, e);
                return Err(Error::Http(e));
            }
        };
        let response = check_status(response, failure).await?;
        let body = response.json::<T>().await.map_err(|e| {
            let e = e.without_url();
            error!("{}: unreadable response body: {}", failure.fallback, e);
            Error::Http(e)
        })?;
        Ok(body)
    }
}

async fn check_status(response: Response, failure: Failure) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        debug!("Request succeeded with {}", status);
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = server_message(&text, failure.field).unwrap_or_else(|| failure.fallback.to_string());
    error!("{} ({}): {}", failure.fallback, status, message);
    Err(Error::api(status.as_u16(), message))
}

fn server_message(body: &str, field: ErrorField) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match field {
        ErrorField::Message => body.message,
        ErrorField::Error => body.error,
    };
    message.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_reads_the_requested_field() {
        let body = r#"{"message":"Invalid username or password","error":"other"}"#;
        assert_eq!(
            server_message(body, ErrorField::Message).as_deref(),
            Some("Invalid username or password")
        );
        assert_eq!(server_message(body, ErrorField::Error).as_deref(), Some("other"));
    }

    #[test]
    fn server_message_ignores_blank_and_non_json() {
        assert_eq!(server_message(r#"{"message":"  "}"#, ErrorField::Message), None);
        assert_eq!(server_message("<html>502</html>", ErrorField::Message), None);
        assert_eq!(server_message(r#"{"error":"x"}"#, ErrorField::Message), None);
    }
}
