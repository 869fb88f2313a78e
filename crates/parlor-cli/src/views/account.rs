//! Register, login, forgot-password and reset-password pages.

use parlor_client::Session;
use parlor_types::api::{LoginRequest, RegisterRequest};

use super::{MAIN_PATH, input};

pub async fn register(
    session: &Session,
    username: String,
    email: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = input::required(password, "Password").await?;
    let req = RegisterRequest {
        username,
        email,
        password,
    };
    let resp = session.auth().register(&req).await?;
    println!("{}", resp.message);
    println!("Log in with: parlor login --username {}", resp.user.username);
    Ok(())
}

pub async fn login(
    session: &mut Session,
    username: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = input::required(password, "Password").await?;
    let profile = session
        .login(&LoginRequest { username, password })
        .await?;
    println!("Login successful. Welcome, {}!", profile.username);
    println!("Continue to {} with: parlor chat", MAIN_PATH);
    Ok(())
}

pub async fn forgot_password(session: &Session, email: String) -> anyhow::Result<()> {
    let resp = session.auth().forgot_password(&email).await?;
    println!("{}", resp.message);
    Ok(())
}

pub async fn reset_password(
    session: &Session,
    token: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = input::required(password, "New password").await?;
    let resp = session.auth().reset_password(token, &password).await?;
    println!("{}", resp.message);
    println!("Log in with your new password: parlor login");
    Ok(())
}
