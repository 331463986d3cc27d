//! Register, login and whoami commands

use anyhow::Result;
use colored::Colorize;

use tally_core::{PublicAccount, Session};

use super::{get_context, read_secret, report};

pub async fn run_register(
    ephemeral: bool,
    username: String,
    email: String,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = read_secret(password, "Password", true)?;
    let ctx = get_context(ephemeral)?;
    let result = ctx
        .account_service
        .register(&username, &email, &password)
        .await;

    report("register", result, json, |session| {
        println!("{}", "Account registered".green());
        print_session(session);
    })
}

pub async fn run_login(
    ephemeral: bool,
    email: String,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = read_secret(password, "Password", false)?;
    let ctx = get_context(ephemeral)?;
    let result = ctx.account_service.authenticate(&email, &password).await;

    report("login", result, json, |session| {
        println!("{}", "Logged in".green());
        print_session(session);
    })
}

pub async fn run_whoami(ephemeral: bool, token: String, json: bool) -> Result<()> {
    let ctx = get_context(ephemeral)?;
    let result = ctx.account_service.verify_token(&token).await;

    report("whoami", result, json, print_account)
}

fn print_session(session: &Session) {
    print_account(&session.account);
    println!("  Token: {}", session.token);
    println!(
        "{}",
        "Tokens expire after the configured TTL (1 hour by default).".dimmed()
    );
}

pub fn print_account(account: &PublicAccount) {
    let state = if account.active {
        "active".green()
    } else {
        "deactivated".yellow()
    };
    println!("  Account ID: {}", account.id);
    println!("  Username: {}", account.username);
    println!("  Email: {}", account.email);
    println!("  Status: {}", state);
}
