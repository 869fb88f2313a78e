//! Command-line surface.
//!
//! Connection settings can come from flags or from the environment (and a
//! `.env` file, loaded before parsing):
//!
//! ```bash
//! parlor --api-url https://chat.example.com login --username ada
//! PARLOR_API_URL=https://chat.example.com parlor chat
//! ```

use std::path::PathBuf;

use anyhow::Context;
use chrono::TimeDelta;
use clap::{Args, Parser, Subcommand};

use parlor_client::ClientConfig;
use parlor_client::config::{DEFAULT_API_URL, DEFAULT_TOKEN_PATH, DEFAULT_TOKEN_TTL_HOURS};

#[derive(Debug, Parser)]
#[command(name = "parlor")]
#[command(about = "Terminal client for the Parlor chat service")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub client: ClientArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the servers are and where tokens live between runs.
#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// Base URL of the REST API.
    #[arg(long, global = true, env = "PARLOR_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Base URL of the realtime server. Defaults to the API URL.
    #[arg(long, global = true, env = "PARLOR_SOCKET_URL")]
    pub socket_url: Option<String>,

    /// File holding the access/refresh token pair.
    #[arg(long, global = true, env = "PARLOR_TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH)]
    pub token_path: PathBuf,

    /// Hours before stored tokens are treated as absent.
    #[arg(long, global = true, env = "PARLOR_TOKEN_TTL_HOURS", default_value_t = DEFAULT_TOKEN_TTL_HOURS)]
    pub token_ttl_hours: i64,
}

impl ClientArgs {
    pub fn to_config(&self) -> anyhow::Result<ClientConfig> {
        let socket_url = self.socket_url.as_deref().unwrap_or(&self.api_url);
        let mut config =
            ClientConfig::new(&self.api_url, socket_url).context("invalid server URL")?;
        config.token_path = self.token_path.clone();
        config.token_ttl = TimeDelta::hours(self.token_ttl_hours);
        config.validate().context("invalid client configuration")?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        username: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Revoke the session on the server and forget it locally.
    Logout,

    /// Ask for a password reset email.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },

    /// Set a new password using the token from the reset email.
    ResetPassword {
        token: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Show the signed-in profile, or change it.
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },

    /// List the other users.
    Users,

    /// Open the chat room.
    Chat {
        /// Channel to join on entry.
        #[arg(long)]
        channel: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    /// Change username, email or avatar. Omitted fields stay as they are.
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Image file to upload as the avatar.
        #[arg(long)]
        image: Option<PathBuf>,
    },
}
