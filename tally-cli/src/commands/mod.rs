//! CLI command implementations

pub mod accounts;
pub mod auth;
pub mod logs;
pub mod tx;
pub mod wallet;

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use dialoguer::Password;
use serde::Serialize;
use tally_core::config::Config;
use tally_core::services::LoggingService;
use tally_core::{Error, OperationResult, TallyContext};
use uuid::Uuid;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let tally_dir = get_tally_dir().ok()?;
    std::fs::create_dir_all(&tally_dir).ok()?;
    LoggingService::new(&tally_dir, env!("CARGO_PKG_VERSION")).ok()
}

/// Get the tally directory from environment or default
pub fn get_tally_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tally"))
        .ok_or_else(|| anyhow!("Could not find home directory; set TALLY_DIR"))
}

/// Build the tally context
///
/// A missing token secret is generated here and written to settings.json,
/// so every later invocation signs and verifies with the same key.
pub fn get_context(ephemeral: bool) -> Result<TallyContext> {
    let tally_dir = get_tally_dir()?;
    std::fs::create_dir_all(&tally_dir)
        .with_context(|| format!("Failed to create tally directory: {:?}", tally_dir))?;

    let mut config = Config::load(&tally_dir)?;

    if ephemeral {
        config.ensure_token_secret();
        return TallyContext::in_memory(config).context("Failed to initialize in-memory store");
    }

    if config.ensure_token_secret() {
        config
            .save(&tally_dir)
            .context("Failed to save generated token secret")?;
        tracing::info!("generated a new token secret");
    }

    TallyContext::new(&tally_dir, config).context("Failed to initialize tally context")
}

/// Print a service result and record the outcome in the audit log
///
/// With `json` the result is printed as an `OperationResult` envelope,
/// failures included. The error is still returned so the exit code is set.
pub fn report<T: Serialize>(
    command: &str,
    result: tally_core::domain::result::Result<T>,
    json: bool,
    render: impl FnOnce(&T),
) -> Result<()> {
    // Logging should never break the command
    if let Some(logger) = get_logger() {
        let _ = match &result {
            Ok(_) => logger.log_command(command),
            Err(e) => logger.log_error(command, e),
        };
    }

    match result {
        Ok(data) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&OperationResult::ok(&data))?);
            } else {
                render(&data);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let envelope: OperationResult<T> = OperationResult::fail(&e);
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            }
            Err(e.into())
        }
    }
}

/// Use the given secret, otherwise prompt on a terminal or read a line from stdin
pub fn read_secret(given: Option<String>, prompt: &str, confirm: bool) -> Result<String> {
    if let Some(secret) = given {
        return Ok(secret);
    }

    if atty::is(atty::Stream::Stdin) {
        let mut input = Password::new().with_prompt(prompt);
        if confirm {
            input = input.with_confirmation("Repeat password", "Passwords do not match");
        }
        return Ok(input.interact()?);
    }

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Parse an id argument, naming the argument on failure
pub fn parse_id(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| {
        anyhow::Error::new(Error::validation(format!("{} is not a valid id: {}", what, value)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {} ", id), "account").unwrap(), id);

        let err = parse_id("nope", "wallet").unwrap_err();
        assert!(err.to_string().contains("wallet is not a valid id"));
    }

    #[test]
    fn test_read_secret_prefers_given_value() {
        let secret = read_secret(Some("secret123".to_string()), "Password", false).unwrap();
        assert_eq!(secret, "secret123");
    }
}
