use std::path::PathBuf;

use anyhow::Context;

use parlor_client::{ImageUpload, Session};
use parlor_types::api::ProfileUpdate;

use super::navbar;

pub async fn show(session: &mut Session) -> anyhow::Result<()> {
    let profile = session.refresh_profile().await?;
    navbar::render(profile);
    println!("Username: {}", profile.username);
    println!("Email:    {}", profile.email);
    if let Some(url) = &profile.image_url {
        println!("Avatar:   {}", url);
    }
    Ok(())
}

pub async fn update(
    session: &mut Session,
    username: Option<String>,
    email: Option<String>,
    image: Option<PathBuf>,
) -> anyhow::Result<()> {
    let image = match image {
        Some(path) => Some(
            ImageUpload::from_path(&path)
                .await
                .with_context(|| format!("cannot read image {}", path.display()))?,
        ),
        None => None,
    };

    let update = ProfileUpdate { username, email };
    let resp = session.profiles().update_profile(&update, image).await?;
    if !resp.message.is_empty() {
        println!("{}", resp.message);
    }

    show(session).await
}
