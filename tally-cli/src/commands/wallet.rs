//! Wallet command - open and inspect wallets

use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use rust_decimal::Decimal;

use tally_core::Wallet;

use super::{get_context, parse_id, report};
use crate::output;

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Open the wallet for an account
    Open {
        /// Owning account ID
        #[arg(long)]
        account_id: String,
        /// Starting balance (defaults to 0)
        #[arg(long)]
        balance: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a wallet by its own ID or by its owner
    Show {
        /// Wallet ID
        #[arg(long, required_unless_present = "account_id", conflicts_with = "account_id")]
        wallet_id: Option<String>,
        /// Owning account ID
        #[arg(long)]
        account_id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ephemeral: bool, command: WalletCommands) -> Result<()> {
    match command {
        WalletCommands::Open {
            account_id,
            balance,
            json,
        } => {
            let account_id = parse_id(&account_id, "account")?;
            let balance = balance
                .map(|b| Decimal::from_str(b.trim()).map_err(|_| anyhow!("Invalid balance amount: {}", b)))
                .transpose()?;

            let ctx = get_context(ephemeral)?;
            let result = ctx.wallet_service.open_wallet(account_id, balance).await;

            report("wallet open", result, json, |wallet| {
                output::success("Wallet opened");
                print_wallet(wallet);
            })
        }
        WalletCommands::Show {
            wallet_id,
            account_id,
            json,
        } => {
            let ctx = get_context(ephemeral)?;
            let result = match (wallet_id, account_id) {
                (Some(wallet_id), _) => {
                    let wallet_id = parse_id(&wallet_id, "wallet")?;
                    ctx.wallet_service.get_wallet(wallet_id).await
                }
                (None, Some(account_id)) => {
                    let account_id = parse_id(&account_id, "account")?;
                    ctx.wallet_service.wallet_for_account(account_id).await
                }
                (None, None) => anyhow::bail!("Pass --wallet-id or --account-id"),
            };

            let transactions = match &result {
                Ok(wallet) => ctx.wallet_service.transaction_count(wallet.id).await.ok(),
                Err(_) => None,
            };

            report("wallet show", result, json, |wallet| {
                print_wallet(wallet);
                if let Some(count) = transactions {
                    println!("  Transactions: {}", count);
                }
            })
        }
    }
}

fn print_wallet(wallet: &Wallet) {
    println!("  Wallet ID: {}", wallet.id);
    println!("  Account ID: {}", wallet.account_id);
    println!("  Balance: {}", wallet.balance);
    println!("  Opened: {}", wallet.created_at.format("%Y-%m-%d %H:%M:%S"));
}
