//! The messaging collaborator used by the worker, dispatcher and login flow
//!
//! `TelegramClient` is the production implementation; tests script their own.

use async_trait::async_trait;

use crate::error::Result;

/// A send target: an opaque handle plus the title shown in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination<H> {
    pub handle: H,
    pub title: String,
}

impl<H> Destination<H> {
    pub fn new(handle: H, title: impl Into<String>) -> Self {
        Self {
            handle,
            title: title.into(),
        }
    }
}

/// Operations the sender needs from a messaging account.
///
/// Every call may suspend on network I/O and may fail with a transport or
/// protocol error. Implementations are owned by a single worker task and are
/// never used concurrently.
#[async_trait]
pub trait MessagingClient: Send + Sync + 'static {
    /// Handle passed back to `send_message` for each destination.
    type Handle: Clone + Send + Sync + 'static;

    /// Returned by `request_code` and consumed by `sign_in`.
    type CodeToken: Send + 'static;

    async fn connect(&mut self) -> Result<()>;

    async fn is_connected(&self) -> bool;

    async fn is_authorized(&mut self) -> Result<bool>;

    async fn request_code(&mut self, phone: &str) -> Result<Self::CodeToken>;

    async fn sign_in(&mut self, phone: &str, code: &str, token: Self::CodeToken) -> Result<()>;

    /// Group dialogs of the account, in the order the service lists them.
    async fn list_group_dialogs(&mut self) -> Result<Vec<Destination<Self::Handle>>>;

    async fn send_message(&mut self, destination: &Self::Handle, text: &str) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn log_out(&mut self) -> Result<()>;
}
