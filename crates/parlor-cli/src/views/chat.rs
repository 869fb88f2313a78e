//! The main chat room: history, then live events and stdin input until
//! `/quit` or end of input.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use parlor_client::{RealtimeChannel, SendOutcome, Session};
use parlor_types::events::ServerEvent;
use parlor_types::{ChatMessage, MembershipState};

use super::navbar;
use crate::TRACING_TARGET_VIEW;

/// A line typed into the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Join(String),
    Leave(Option<String>),
    Quit,
    Message(String),
    Usage(&'static str),
}

impl Input {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let (command, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (trimmed, None),
        };
        match (command, arg) {
            ("/quit", _) => Input::Quit,
            ("/join", Some(channel)) => Input::Join(channel.to_string()),
            ("/join", None) => Input::Usage("/join <channel>"),
            ("/leave", channel) => Input::Leave(channel.map(str::to_string)),
            _ => Input::Message(line.to_string()),
        }
    }
}

pub async fn run(session: &mut Session, channel: Option<String>) -> anyhow::Result<()> {
    let me = session.refresh_profile().await?.clone();
    navbar::render(&me);

    let history = session
        .messages()
        .history()
        .await
        .context("could not load chat history")?;
    for message in &history {
        print_message(message);
    }

    let mut realtime = session.realtime();
    let mut events = realtime.connect(session.store().as_ref())?;
    realtime
        .wait_connected()
        .await
        .context("could not reach the chat server")?;

    let mut current = None;
    if let Some(channel) = channel {
        realtime.join_channel(&channel)?;
        current = Some(channel);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    println!("* Disconnected from the chat server");
                    break;
                };
                print_event(&event);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if handle_line(&mut realtime, &me.username, &mut current, &line) == Flow::Quit {
                    break;
                }
            }
        }
    }

    realtime.disconnect().await;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Act on one typed line. A channel that stopped accepting input ends the
/// room after telling the user; it never aborts the view.
fn handle_line(
    realtime: &mut RealtimeChannel,
    username: &str,
    current: &mut Option<String>,
    line: &str,
) -> Flow {
    let outcome = match Input::parse(line) {
        Input::Quit => return Flow::Quit,
        Input::Usage(usage) => {
            println!("usage: {}", usage);
            return Flow::Continue;
        }
        Input::Join(channel) => realtime.join_channel(&channel).map(|()| {
            *current = Some(channel);
        }),
        Input::Leave(channel) => {
            let Some(channel) = channel.or_else(|| current.clone()) else {
                println!("usage: /leave <channel>");
                return Flow::Continue;
            };
            realtime.leave_channel(&channel).map(|()| {
                if current.as_deref() == Some(channel.as_str()) {
                    *current = None;
                }
            })
        }
        Input::Message(text) => {
            let mut message = ChatMessage::new(username, text);
            if let Some(channel) = current.as_ref() {
                message = message.in_channel(channel.clone());
            }
            realtime.send_message(message).map(|outcome| {
                if outcome == SendOutcome::Skipped {
                    tracing::debug!(target: TRACING_TARGET_VIEW, "blank message not sent");
                }
            })
        }
    };

    match outcome {
        Ok(()) => Flow::Continue,
        Err(e) => {
            tracing::warn!(target: TRACING_TARGET_VIEW, error = %e, "chat input rejected");
            println!("* {}", e);
            Flow::Quit
        }
    }
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::ServerMessage { message } => println!("* {}", message),
        ServerEvent::ReceiveMessage(message) => print_message(message),
        ServerEvent::ChannelUpdate(update) => {
            let who = update.username.as_deref().unwrap_or("someone");
            let verb = match update.action {
                MembershipState::Joined => "joined",
                MembershipState::Left => "left",
            };
            println!("* {} {} #{}", who, verb, update.channel);
        }
    }
}

fn print_message(message: &ChatMessage) {
    match &message.channel {
        Some(channel) => println!("[#{}] {}: {}", channel, message.username, message.message),
        None => println!("{}: {}", message.username, message.message),
    }
}
