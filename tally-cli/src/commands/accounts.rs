//! Accounts command - list, activate and deactivate accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::auth::print_account;
use super::{get_context, parse_id, report};
use crate::output;

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List all accounts, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Allow an account to log in again
    Activate {
        /// Account ID
        account_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Block an account from logging in
    Deactivate {
        /// Account ID
        account_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ephemeral: bool, command: AccountsCommands) -> Result<()> {
    match command {
        AccountsCommands::List { json } => {
            let ctx = get_context(ephemeral)?;
            let result = ctx.account_service.list().await;

            report("accounts list", result, json, |accounts| {
                if accounts.is_empty() {
                    println!("No accounts found.");
                    return;
                }

                let mut table = output::create_table();
                table.set_header(vec!["ID", "Username", "Email", "Status", "Created"]);
                for account in accounts {
                    table.add_row(vec![
                        account.id.to_string(),
                        account.username.clone(),
                        account.email.clone(),
                        if account.active { "active" } else { "deactivated" }.to_string(),
                        account.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    ]);
                }
                println!("{}", table);
                println!("{}", format!("{} account(s)", accounts.len()).dimmed());
            })
        }
        AccountsCommands::Activate { account_id, json } => {
            set_active(ephemeral, &account_id, true, json).await
        }
        AccountsCommands::Deactivate { account_id, json } => {
            set_active(ephemeral, &account_id, false, json).await
        }
    }
}

async fn set_active(ephemeral: bool, account_id: &str, active: bool, json: bool) -> Result<()> {
    let account_id = parse_id(account_id, "account")?;
    let ctx = get_context(ephemeral)?;
    let result = ctx.account_service.set_active(account_id, active).await;

    let command = if active {
        "accounts activate"
    } else {
        "accounts deactivate"
    };
    report(command, result, json, |account| {
        if active {
            output::success("Account activated");
        } else {
            output::warning("Account deactivated");
        }
        print_account(account);
    })
}
