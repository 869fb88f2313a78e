use parlor_client::Session;
use parlor_types::UserProfile;

/// Header line shown above the signed-in views.
pub fn render(profile: &UserProfile) {
    let avatar = match &profile.image_url {
        Some(url) => url.clone(),
        None => format!("[{}]", profile.initials()),
    };
    println!("{} {} <{}>", avatar, profile.username, profile.email);
    println!("{}", "-".repeat(40));
}

pub async fn logout(session: &mut Session) -> anyhow::Result<()> {
    session.logout().await?;
    println!("Logged out.");
    Ok(())
}
