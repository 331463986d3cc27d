//! Transaction command - post to and read a wallet's ledger

use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;

use super::{get_context, parse_id, report};
use crate::output;

#[derive(Subcommand)]
pub enum TxCommands {
    /// Append a transaction to a wallet's ledger
    ///
    /// The wallet balance is not changed by posting.
    Post {
        /// Wallet ID
        #[arg(long)]
        wallet_id: String,
        /// Amount, greater than zero
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// Transaction type: send or receive
        #[arg(long = "type")]
        kind: String,
        /// Free-form category label
        #[arg(long, default_value = "")]
        category: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a wallet's transactions, oldest first
    List {
        /// Wallet ID
        #[arg(long)]
        wallet_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ephemeral: bool, command: TxCommands) -> Result<()> {
    match command {
        TxCommands::Post {
            wallet_id,
            amount,
            kind,
            category,
            json,
        } => {
            let wallet_id = parse_id(&wallet_id, "wallet")?;
            let amount = Decimal::from_str(amount.trim())
                .map_err(|_| anyhow!("Invalid amount: {}", amount))?;

            let ctx = get_context(ephemeral)?;
            let result = ctx
                .wallet_service
                .post_transaction(wallet_id, amount, &kind, &category)
                .await;

            report("tx post", result, json, |entry| {
                output::success("Transaction posted");
                println!("  Transaction ID: {}", entry.id());
                println!("  Wallet ID: {}", entry.wallet_id());
                println!("  Type: {}", entry.kind());
                println!("  Amount: {}", entry.amount());
                println!("  Category: {}", entry.category());
                println!("  Time: {}", entry.created_at().format("%Y-%m-%d %H:%M:%S"));
            })
        }
        TxCommands::List { wallet_id, json } => {
            let wallet_id = parse_id(&wallet_id, "wallet")?;
            let ctx = get_context(ephemeral)?;
            let result = ctx.wallet_service.ledger(wallet_id).await;

            report("tx list", result, json, |entries| {
                if entries.is_empty() {
                    println!("No transactions found.");
                    return;
                }

                let mut table = output::create_table();
                table.set_header(vec!["Time", "Type", "Amount", "Category", "ID"]);
                for entry in entries {
                    table.add_row(vec![
                        entry.created_at().format("%Y-%m-%d %H:%M:%S").to_string(),
                        entry.kind().to_string(),
                        entry.amount().to_string(),
                        entry.category().to_string(),
                        entry.id().to_string(),
                    ]);
                }
                println!("{}", table);
                println!("{}", format!("{} transaction(s)", entries.len()).dimmed());
            })
        }
    }
}
