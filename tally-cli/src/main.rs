//! Tally CLI - accounts, wallets and ledgers from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{accounts, auth, logs, tx, wallet};

/// Tally - account and wallet administration
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Use a throwaway in-memory store; nothing is persisted
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account and print its first token
    Register {
        /// Display name (need not be unique)
        #[arg(long)]
        username: String,
        /// Login email, unique across accounts
        #[arg(long)]
        email: String,
        /// Password (prompted for, or read from stdin, when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in and print a fresh token
    Login {
        /// Login email
        #[arg(long)]
        email: String,
        /// Password (prompted for, or read from stdin, when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the account a token belongs to
    Whoami {
        /// Bearer token
        #[arg(long, env = "TALLY_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Administer accounts
    Accounts {
        #[command(subcommand)]
        command: accounts::AccountsCommands,
    },

    /// Open and inspect wallets
    Wallet {
        #[command(subcommand)]
        command: wallet::WalletCommands,
    },

    /// Post and list ledger transactions
    Tx {
        #[command(subcommand)]
        command: tx::TxCommands,
    },

    /// View and manage the audit log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Diagnostics go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ephemeral = cli.ephemeral;
    match cli.command {
        Commands::Register {
            username,
            email,
            password,
            json,
        } => auth::run_register(ephemeral, username, email, password, json).await,
        Commands::Login {
            email,
            password,
            json,
        } => auth::run_login(ephemeral, email, password, json).await,
        Commands::Whoami { token, json } => auth::run_whoami(ephemeral, token, json).await,
        Commands::Accounts { command } => accounts::run(ephemeral, command).await,
        Commands::Wallet { command } => wallet::run(ephemeral, command).await,
        Commands::Tx { command } => tx::run(ephemeral, command).await,
        Commands::Logs { command } => logs::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tx_post() {
        let cli = Cli::try_parse_from([
            "tally",
            "tx",
            "post",
            "--wallet-id",
            "6f1c1a52-6f0e-4c55-9a43-2d8a7f0f6f11",
            "--amount",
            "50",
            "--type",
            "receive",
            "--category",
            "deposit",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Tx { .. }));
        assert!(!cli.ephemeral);
    }

    #[test]
    fn test_wallet_show_needs_an_id() {
        assert!(Cli::try_parse_from(["tally", "wallet", "show"]).is_err());
        assert!(Cli::try_parse_from([
            "tally",
            "--ephemeral",
            "wallet",
            "show",
            "--account-id",
            "6f1c1a52-6f0e-4c55-9a43-2d8a7f0f6f11",
        ])
        .is_ok());
    }
}
