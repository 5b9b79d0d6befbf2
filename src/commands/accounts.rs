//! Manage saved accounts

use crate::accounts::AccountStore;
use crate::config::Config;
use crate::error::Result;
use crate::session::SessionPaths;

pub fn list() -> Result<()> {
    let config = Config::new();
    let store = AccountStore::load(&config.accounts_file)?;

    if store.is_empty() {
        println!("No accounts saved yet in {}.", store.path().display());
        return Ok(());
    }

    let paths = SessionPaths::from_config(&config);
    println!("Accounts in {} ({}):\n", store.path().display(), store.len());
    for phone in store.phones() {
        let session = if paths.exists(phone) {
            "session saved"
        } else {
            "not logged in"
        };
        println!("  {:<18} {}", phone, session);
    }
    Ok(())
}

pub fn add(phone: &str, api_id: &str, api_hash: &str) -> Result<()> {
    let config = Config::new();
    let mut store = AccountStore::load(&config.accounts_file)?;
    store.add(phone, api_id, api_hash)?;
    println!("✅ Account saved successfully to {}!", store.path().display());
    Ok(())
}

pub fn delete(phone: &str) -> Result<()> {
    let config = Config::new();
    let paths = SessionPaths::from_config(&config);
    let mut store = AccountStore::load(&config.accounts_file)?;

    if store.delete(phone, &paths)? {
        println!("Account {} deleted.", phone);
    } else {
        println!("Account {} not found.", phone);
    }
    Ok(())
}
