//! Saved account credentials
//!
//! A flat JSON file mapping phone number to `{ "api_id": .., "api_hash": .. }`.
//! Every mutation rewrites the whole file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::session::SessionPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    accounts: BTreeMap<String, AccountCredentials>,
}

impl AccountStore {
    /// Load the store. A missing or unreadable file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let accounts = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(accounts) => accounts,
                Err(err) => {
                    warn!(path = %path.display(), "Ignoring unreadable accounts file: {}", err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(Error::IoError(err)),
        };

        Ok(Self { path, accounts })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, phone: &str) -> Option<&AccountCredentials> {
        self.accounts.get(phone)
    }

    pub fn require(&self, phone: &str) -> Result<&AccountCredentials> {
        self.get(phone)
            .ok_or_else(|| Error::AccountNotFound(phone.to_string()))
    }

    /// Phone numbers in sorted order.
    pub fn phones(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Validate and save a new account.
    pub fn add(&mut self, phone: &str, api_id: &str, api_hash: &str) -> Result<()> {
        let phone = phone.trim();
        let api_id = api_id.trim();
        let api_hash = api_hash.trim();

        if phone.is_empty() || api_id.is_empty() || api_hash.is_empty() {
            return Err(Error::validation("All fields are required."));
        }

        let api_id: i32 = api_id
            .parse()
            .map_err(|_| Error::validation("Invalid API ID. Must be a number."))?;

        if self.accounts.contains_key(phone) {
            return Err(Error::validation("Account already exists."));
        }

        self.accounts.insert(
            phone.to_string(),
            AccountCredentials {
                api_id,
                api_hash: api_hash.to_string(),
            },
        );
        if let Err(err) = self.save() {
            self.accounts.remove(phone);
            return Err(err);
        }
        info!(%phone, "Account saved");
        Ok(())
    }

    /// Remove an account and its session artifacts. Returns false if unknown.
    pub fn delete(&mut self, phone: &str, sessions: &SessionPaths) -> Result<bool> {
        let Some(credentials) = self.accounts.remove(phone) else {
            return Ok(false);
        };

        if let Err(err) = self.save() {
            self.accounts.insert(phone.to_string(), credentials);
            return Err(err);
        }
        sessions.remove(phone)?;
        info!(%phone, "Account deleted");
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let payload = serde_json::to_string_pretty(&self.accounts)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }
}
