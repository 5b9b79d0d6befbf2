//! List the groups a campaign would be sent to

use super::OpenAccount;
use crate::config::Config;
use crate::error::Result;
use crate::session::{check_session_exists, SessionPaths};

pub async fn run(phone: &str) -> Result<()> {
    let config = Config::new();
    check_session_exists(&SessionPaths::from_config(&config), phone)?;
    let account = OpenAccount::open(&config, phone)?;

    let result = print_groups(&account).await;
    account.close().await;
    result
}

async fn print_groups(account: &OpenAccount) -> Result<()> {
    account.require_authorized().await?;

    let groups = account.session.load_groups().await?;
    println!("Groups Found: {}\n", groups.len());
    for (idx, group) in groups.iter().enumerate() {
        println!("{:>4}. {}", idx + 1, group.title);
    }
    Ok(())
}
