//! One module per page of the chat front-end. Each view takes the session
//! explicitly; nothing about the signed-in user lives anywhere else.

mod account;
mod chat;
mod input;
mod navbar;
mod profile;
mod users;

use anyhow::bail;

use parlor_client::guard::LOGIN_PATH;
use parlor_client::{Error, Navigation, Session};

use crate::TRACING_TARGET_VIEW;
use crate::config::{Command, ProfileAction};

pub const MAIN_PATH: &str = "/main";
pub const PROFILE_PATH: &str = "/profile";
pub const USERS_PATH: &str = "/";

pub async fn render(command: Command, session: &mut Session) -> anyhow::Result<()> {
    let route = protected_route(&command);
    if let Some(path) = route {
        guard(session, path)?;
    }

    let result = dispatch(command, session).await;

    // A stored token the server no longer accepts is as good as none.
    if route.is_some() && is_unauthorized(&result) {
        session.invalidate()?;
        println!("Session expired. Redirecting to {}", LOGIN_PATH);
    }
    result
}

async fn dispatch(command: Command, session: &mut Session) -> anyhow::Result<()> {
    match command {
        Command::Register {
            username,
            email,
            password,
        } => account::register(session, username, email, password).await,
        Command::Login { username, password } => account::login(session, username, password).await,
        Command::Logout => navbar::logout(session).await,
        Command::ForgotPassword { email } => account::forgot_password(session, email).await,
        Command::ResetPassword { token, password } => {
            account::reset_password(session, &token, password).await
        }
        Command::Profile { action: None } => profile::show(session).await,
        Command::Profile {
            action: Some(ProfileAction::Update {
                username,
                email,
                image,
            }),
        } => profile::update(session, username, email, image).await,
        Command::Users => users::list(session).await,
        Command::Chat { channel } => chat::run(session, channel).await,
    }
}

/// The page each signed-in command stands for.
fn protected_route(command: &Command) -> Option<&'static str> {
    match command {
        Command::Chat { .. } => Some(MAIN_PATH),
        Command::Profile { .. } => Some(PROFILE_PATH),
        Command::Users => Some(USERS_PATH),
        _ => None,
    }
}

/// Protected views render only with a stored access token; otherwise the
/// user is sent to the login page.
fn guard(session: &Session, path: &str) -> anyhow::Result<()> {
    match session.navigate(path)? {
        Navigation::Allow => Ok(()),
        Navigation::Redirect(to) => {
            tracing::info!(target: TRACING_TARGET_VIEW, from = path, to = %to, "redirecting");
            println!("Redirecting to {}", to);
            bail!("not signed in: run `parlor login` first")
        }
    }
}

fn is_unauthorized(result: &anyhow::Result<()>) -> bool {
    let Err(error) = result else {
        return false;
    };
    matches!(
        error.downcast_ref::<Error>(),
        Some(Error::Api { status: 401, .. })
    )
}
