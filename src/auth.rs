//! Login flow and account-level operations
//!
//! Everything here runs as a job on the account's [`Worker`]; the caller
//! only ever waits for the result.

use std::fmt;

use tracing::{info, warn};

use crate::client::{Destination, MessagingClient};
use crate::error::{Error, Result};
use crate::session::SessionPaths;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Authorized,
    CodeRequired,
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginStatus::Authorized => write!(f, "authorized"),
            LoginStatus::CodeRequired => write!(f, "phone_required"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutStatus {
    LoggedOut,
    NotConnected,
    /// The server call failed; local session files were still removed.
    RemoteFailed(String),
}

impl LogoutStatus {
    pub fn status_line(&self) -> String {
        match self {
            LogoutStatus::LoggedOut => "Logout successful. Session file removed.".to_string(),
            LogoutStatus::NotConnected => {
                "Client was not connected. Session file removed.".to_string()
            }
            LogoutStatus::RemoteFailed(reason) => {
                format!("Logout failed: {}. Session file manually removed.", reason)
            }
        }
    }
}

/// One phone number's account, driven through its worker.
pub struct AccountSession<C: MessagingClient> {
    phone: String,
    worker: Worker<C>,
    sessions: SessionPaths,
}

impl<C: MessagingClient> AccountSession<C> {
    pub fn new(phone: impl Into<String>, worker: Worker<C>, sessions: SessionPaths) -> Self {
        Self {
            phone: phone.into(),
            worker,
            sessions,
        }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn worker(&self) -> &Worker<C> {
        &self.worker
    }

    /// Connect if needed and report whether a login code is required.
    pub async fn connect(&self) -> Result<LoginStatus> {
        let status = self
            .worker
            .call(|client: &mut C| {
                Box::pin(async move {
                    if !client.is_connected().await {
                        client.connect().await?;
                    }
                    let status = if client.is_authorized().await? {
                        LoginStatus::Authorized
                    } else {
                        LoginStatus::CodeRequired
                    };
                    Ok::<_, Error>(status)
                })
            })
            .await??;

        info!(phone = %self.phone, %status, "Connected");
        Ok(status)
    }

    pub async fn request_code(&self) -> Result<C::CodeToken> {
        let phone = self.phone.clone();
        let token = self
            .worker
            .call(move |client: &mut C| Box::pin(async move { client.request_code(&phone).await }))
            .await??;

        info!(phone = %self.phone, "Login code requested");
        Ok(token)
    }

    /// Complete the login with the code the user received.
    pub async fn sign_in(&self, token: C::CodeToken, code: &str) -> Result<()> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(Error::validation("Please enter the code."));
        }

        let phone = self.phone.clone();
        let authorized = self
            .worker
            .call(move |client: &mut C| {
                Box::pin(async move {
                    client.sign_in(&phone, &code, token).await?;
                    client.is_authorized().await
                })
            })
            .await??;

        if !authorized {
            return Err(Error::AuthorizationRequired);
        }
        Ok(())
    }

    /// Enumerate the account's group chats.
    pub async fn load_groups(&self) -> Result<Vec<Destination<C::Handle>>> {
        let groups = self
            .worker
            .call(|client: &mut C| {
                Box::pin(async move {
                    if !client.is_connected().await {
                        client.connect().await?;
                    }
                    client.list_group_dialogs().await
                })
            })
            .await??;

        info!(phone = %self.phone, count = groups.len(), "Loaded groups");
        Ok(groups)
    }

    /// Log out on the server when connected, then drop the local session.
    pub async fn logout(&self) -> Result<LogoutStatus> {
        let remote = self
            .worker
            .call(|client: &mut C| {
                Box::pin(async move {
                    if !client.is_connected().await {
                        return Ok(false);
                    }
                    client.log_out().await.map(|()| true)
                })
            })
            .await?;

        self.sessions.remove(&self.phone)?;

        let status = match remote {
            Ok(true) => LogoutStatus::LoggedOut,
            Ok(false) => LogoutStatus::NotConnected,
            Err(err) => {
                warn!(phone = %self.phone, "Server logout failed: {}", err);
                LogoutStatus::RemoteFailed(err.to_string())
            }
        };
        info!(phone = %self.phone, ?status, "Logged out");
        Ok(status)
    }
}
