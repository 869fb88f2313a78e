use std::sync::Arc;

use parlor_types::ChatMessage;
use parlor_types::api::MessagesResponse;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{ApiTransport, Failure};
use crate::token_store::TokenStore;

const HISTORY_FAILED: Failure = Failure::error("Failed to fetch messages");

/// Chat history, oldest first as the server stores it.
#[derive(Clone)]
pub struct MessageClient {
    transport: ApiTransport,
}

impl MessageClient {
    pub fn new(config: Arc<ClientConfig>, store: Arc<dyn TokenStore>) -> Result<Self> {
        Ok(Self::from_transport(ApiTransport::new(config, store)?))
    }

    pub(crate) fn from_transport(transport: ApiTransport) -> Self {
        Self { transport }
    }

    pub async fn history(&self) -> Result<Vec<ChatMessage>> {
        let url = self.transport.endpoint("message/messages")?;
        let builder = self.transport.authorize(self.transport.http().get(url))?;
        let resp: MessagesResponse = self.transport.send_json(builder, HISTORY_FAILED).await?;
        Ok(resp.messages)
    }
}
