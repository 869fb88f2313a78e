use parlor_client::Session;

pub async fn list(session: &Session) -> anyhow::Result<()> {
    let users = session.profiles().list_users().await?;
    if users.is_empty() {
        println!("No other users yet.");
        return Ok(());
    }
    for user in &users {
        println!("[{}] {} <{}>", user.initials(), user.username, user.email);
    }
    Ok(())
}
