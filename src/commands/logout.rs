//! Log an account out and drop its session file

use tracing::warn;

use super::OpenAccount;
use crate::config::Config;
use crate::error::Result;
use crate::session::SessionPaths;

pub async fn run(phone: &str) -> Result<()> {
    let config = Config::new();
    let paths = SessionPaths::from_config(&config);
    let account = OpenAccount::open(&config, phone)?;

    println!("Logging out...");
    if paths.exists(phone) {
        if let Err(err) = account.session.connect().await {
            warn!(%phone, "Could not connect before logout: {}", err);
        }
    }

    let result = account.session.logout().await;
    account.close().await;

    println!("{}", result?.status_line());
    Ok(())
}
