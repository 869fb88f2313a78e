use std::io::Write;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Use `given` if present, else ask on the terminal. An empty answer is an
/// error; the field is required.
pub async fn required(given: Option<String>, label: &str) -> anyhow::Result<String> {
    if let Some(value) = given {
        return Ok(value);
    }

    eprint!("{}: ", label);
    std::io::stderr().flush().ok();

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .with_context(|| format!("failed to read {}", label))?;

    let value = line.trim_end_matches(['\r', '\n']);
    if value.is_empty() {
        bail!("{} is required", label);
    }
    Ok(value.to_string())
}
