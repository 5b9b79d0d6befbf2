//! Log an account in with a code sent by Telegram

use std::io::{self, Write};

use super::OpenAccount;
use crate::auth::LoginStatus;
use crate::config::Config;
use crate::error::Result;

pub async fn run(phone: &str) -> Result<()> {
    let config = Config::new();
    let account = OpenAccount::open(&config, phone)?;

    println!("Connecting to {}...", phone);
    let result = login(&account, phone).await;
    account.close().await;
    result
}

async fn login(account: &OpenAccount, phone: &str) -> Result<()> {
    if account.session.connect().await? == LoginStatus::Authorized {
        println!("✅ Successfully connected! {} is already logged in.", phone);
        return Ok(());
    }

    println!("📱 Sending code to {}...", phone);
    let token = account.session.request_code().await?;

    print!("Enter the code from Telegram: ");
    io::stdout().flush()?;

    let mut code = String::new();
    io::stdin().read_line(&mut code)?;

    account.session.sign_in(token, &code).await?;
    println!("✅ Login successful!");
    Ok(())
}
