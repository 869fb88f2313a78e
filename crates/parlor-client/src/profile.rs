use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use tracing::info;

use parlor_types::UserProfile;
use parlor_types::api::{MessageResponse, ProfileEnvelope, ProfileUpdate, UpdateProfileResponse, UsersResponse};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{ApiTransport, Failure};
use crate::token_store::TokenStore;

const FETCH_FAILED: Failure = Failure::error("Failed to fetch profile");
const UPDATE_FAILED: Failure = Failure::error("Failed to update profile");
const USERS_FAILED: Failure = Failure::error("Failed to fetch users");

/// An avatar image attached to a profile update.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read an image from disk, guessing the MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("avatar")
            .to_string();
        let content_type = image_mime(path).to_string();
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    fn into_part(self) -> Result<Part> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.content_type)?)
    }
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Read/update the signed-in user's profile and list the other users.
///
/// Nothing is cached; every call goes to the server.
#[derive(Clone)]
pub struct ProfileClient {
    transport: ApiTransport,
}

impl ProfileClient {
    pub fn new(config: Arc<ClientConfig>, store: Arc<dyn TokenStore>) -> Result<Self> {
        Ok(Self::from_transport(ApiTransport::new(config, store)?))
    }

    pub(crate) fn from_transport(transport: ApiTransport) -> Self {
        Self { transport }
    }

    pub async fn get_profile(&self) -> Result<UserProfile> {
        let url = self.transport.endpoint("user/profile")?;
        let builder = self.transport.authorize(self.transport.http().get(url))?;
        let envelope: ProfileEnvelope = self.transport.send_json(builder, FETCH_FAILED).await?;
        Ok(envelope.profile)
    }

    /// Send a multipart update. The image, when given, goes in the `file`
    /// part. Last write wins.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
        image: Option<ImageUpload>,
    ) -> Result<MessageResponse> {
        let url = self.transport.endpoint("user/profile")?;

        let mut form = Form::new();
        for (name, value) in update.fields() {
            form = form.text(name, value);
        }
        if let Some(image) = image {
            form = form.part("file", image.into_part()?);
        }

        let builder = self
            .transport
            .authorize(self.transport.http().put(url))?
            .multipart(form);
        let resp: UpdateProfileResponse = self.transport.send_json(builder, UPDATE_FAILED).await?;

        if !resp.success {
            let message = resp
                .error
                .or(resp.message)
                .unwrap_or_else(|| UPDATE_FAILED.fallback.to_string());
            return Err(Error::api(200, message));
        }

        let message = resp.message.unwrap_or_default();
        info!("Profile updated: {}", message);
        Ok(MessageResponse { message })
    }

    /// Every user except the caller.
    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let url = self.transport.endpoint("user/users")?;
        let builder = self.transport.authorize(self.transport.http().get(url))?;
        let resp: UsersResponse = self.transport.send_json(builder, USERS_FAILED).await?;
        Ok(resp.users)
    }
}
