//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod accounts;
pub mod groups;
pub mod login;
pub mod logout;
pub mod send;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::accounts::AccountStore;
use crate::auth::{AccountSession, LoginStatus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{SessionLock, SessionPaths};
use crate::telegram::TelegramClient;
use crate::worker::Worker;

/// An account opened for one command: locked session, worker and login flow.
pub struct OpenAccount {
    pub session: AccountSession<TelegramClient>,
    _lock: SessionLock,
    task: JoinHandle<TelegramClient>,
}

impl OpenAccount {
    pub fn open(config: &Config, phone: &str) -> Result<Self> {
        let store = AccountStore::load(&config.accounts_file)?;
        let credentials = store.require(phone)?;
        let paths = SessionPaths::from_config(config);

        let lock = SessionLock::for_phone(&paths, phone)?;
        let client = TelegramClient::for_account(credentials, &paths, phone);
        let (worker, task) = Worker::spawn(client);

        Ok(Self {
            session: AccountSession::new(phone, worker, paths),
            _lock: lock,
            task,
        })
    }

    /// Connect and fail unless the session is already logged in.
    pub async fn require_authorized(&self) -> Result<()> {
        match self.session.connect().await? {
            LoginStatus::Authorized => Ok(()),
            LoginStatus::CodeRequired => {
                eprintln!(
                    "⚠️  {} is not logged in. Run: group_sender login {}",
                    self.session.phone(),
                    self.session.phone()
                );
                Err(Error::AuthorizationRequired)
            }
        }
    }

    /// Kill the worker without waiting for the job it is running.
    pub fn abort(self) {
        warn!(phone = %self.session.phone(), "Aborting worker");
        self.task.abort();
    }

    /// Stop the worker and wait until the client has disconnected.
    pub async fn close(self) {
        let Self { session, _lock, task } = self;
        drop(session);
        if let Err(err) = task.await {
            warn!("Worker ended abnormally: {}", err);
        }
    }
}
