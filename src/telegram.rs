//! Telegram implementation of [`MessagingClient`] backed by grammers
//!
//! One client per account: the session database lives at the path derived
//! from the account's phone number and is opened lazily on `connect`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::types::peer::Peer;
use grammers_client::types::LoginToken;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::accounts::AccountCredentials;
use crate::client::{Destination, MessagingClient};
use crate::error::{Error, Result};
use crate::session::SessionPaths;

/// Live MTProto connection: the client plus the background sender runner.
struct Connection {
    client: Client,
    _handle: SenderPoolHandle,
    _session: Arc<SqliteSession>,
    runner: JoinHandle<()>,
}

pub struct TelegramClient {
    api_id: i32,
    api_hash: String,
    session_file: PathBuf,
    connection: Option<Connection>,
}

impl TelegramClient {
    pub fn new(credentials: &AccountCredentials, session_file: impl Into<PathBuf>) -> Self {
        Self {
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            session_file: session_file.into(),
            connection: None,
        }
    }

    /// Client for `phone`, using the session file the paths assign to it.
    pub fn for_account(credentials: &AccountCredentials, paths: &SessionPaths, phone: &str) -> Self {
        Self::new(credentials, paths.session_file(phone))
    }

    fn client(&self) -> Result<&Client> {
        self.connection
            .as_ref()
            .map(|conn| &conn.client)
            .ok_or_else(|| Error::TelegramError("client is not connected".to_string()))
    }
}

#[async_trait]
impl MessagingClient for TelegramClient {
    type Handle = Peer;
    type CodeToken = LoginToken;

    async fn connect(&mut self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }

        if let Some(parent) = self.session_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let session_file = self.session_file.display().to_string();
        let session = Arc::new(
            SqliteSession::open(&session_file)
                .map_err(|e| Error::SessionNotFound(format!("Failed to open session: {}", e)))?,
        );

        let pool = SenderPool::new(session.clone(), self.api_id);
        let client = Client::new(&pool);
        let SenderPool {
            runner,
            updates: _,
            handle,
        } = pool;

        let runner = tokio::spawn(async move {
            runner.run().await;
        });

        info!(session = %session_file, "Connected to Telegram");
        self.connection = Some(Connection {
            client,
            _handle: handle,
            _session: session,
            runner,
        });
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| !conn.runner.is_finished())
    }

    async fn is_authorized(&mut self) -> Result<bool> {
        Ok(self.client()?.is_authorized().await?)
    }

    async fn request_code(&mut self, phone: &str) -> Result<LoginToken> {
        let api_hash = self.api_hash.clone();
        self.client()?
            .request_login_code(phone, &api_hash)
            .await
            .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))
    }

    async fn sign_in(&mut self, phone: &str, code: &str, token: LoginToken) -> Result<()> {
        let user = self
            .client()?
            .sign_in(&token, code)
            .await
            .map_err(|e| Error::TelegramError(format!("Failed to sign in: {}", e)))?;

        info!(%phone, name = %user.full_name(), "Signed in");
        Ok(())
    }

    async fn list_group_dialogs(&mut self) -> Result<Vec<Destination<Peer>>> {
        let client = self.client()?;
        let mut groups = Vec::new();
        let mut dialogs = client.iter_dialogs();

        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| Error::TelegramError(e.to_string()))?
        {
            // Basic groups and megagroups; broadcast channels are Peer::Channel
            if let Peer::Group(group) = &dialog.peer {
                let title = group.title().unwrap_or("Group").to_string();
                groups.push(Destination::new(dialog.peer.clone(), title));
            }
        }

        debug!(count = groups.len(), "Enumerated group dialogs");
        Ok(groups)
    }

    async fn send_message(&mut self, destination: &Peer, text: &str) -> Result<()> {
        self.client()?.send_message(destination, text).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            conn.runner.abort();
            info!("Disconnected from Telegram");
        }
        Ok(())
    }

    async fn log_out(&mut self) -> Result<()> {
        self.client()?.sign_out().await?;
        self.disconnect().await
    }
}
