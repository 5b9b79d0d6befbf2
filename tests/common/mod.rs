//! Shared test double for the messaging client.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use group_sender::{Destination, Error, MessagingClient, Result};

pub const VALID_CODE: &str = "12345";

#[derive(Debug, Default)]
pub struct FakeState {
    pub connected: bool,
    pub authorized: bool,
    pub fail_connect: bool,
    pub fail_logout: bool,
    pub groups: Vec<Destination<u32>>,
    pub failing: HashSet<u32>,
    pub sent: Vec<(u32, String)>,
    pub codes_requested: usize,
    pub connects: usize,
    pub disconnects: usize,
    pub logouts: usize,
}

/// In-memory client. Clones share state so a test can inspect it after the
/// client has moved into a worker.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClient {
    pub fn with_groups(titles: &[&str]) -> Self {
        let client = Self::default();
        client.state().groups = titles
            .iter()
            .enumerate()
            .map(|(i, title)| Destination::new(i as u32 + 1, *title))
            .collect();
        client
    }

    pub fn authorized(self) -> Self {
        self.state().authorized = true;
        self
    }

    pub fn failing_on(self, handle: u32) -> Self {
        self.state().failing.insert(handle);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn sent_handles(&self) -> Vec<u32> {
        self.state().sent.iter().map(|(handle, _)| *handle).collect()
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    type Handle = u32;
    type CodeToken = String;

    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.fail_connect {
            return Err(Error::TelegramError("network unreachable".to_string()));
        }
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn is_authorized(&mut self) -> Result<bool> {
        Ok(self.state().authorized)
    }

    async fn request_code(&mut self, phone: &str) -> Result<String> {
        self.state().codes_requested += 1;
        Ok(format!("hash-{}", phone))
    }

    async fn sign_in(&mut self, phone: &str, code: &str, token: String) -> Result<()> {
        assert_eq!(token, format!("hash-{}", phone));
        if code != VALID_CODE {
            return Err(Error::TelegramError("PHONE_CODE_INVALID".to_string()));
        }
        self.state().authorized = true;
        Ok(())
    }

    async fn list_group_dialogs(&mut self) -> Result<Vec<Destination<u32>>> {
        Ok(self.state().groups.clone())
    }

    async fn send_message(&mut self, destination: &u32, text: &str) -> Result<()> {
        let mut state = self.state();
        state.sent.push((*destination, text.to_string()));
        if state.failing.contains(destination) {
            return Err(Error::TelegramError("CHAT_WRITE_FORBIDDEN".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    async fn log_out(&mut self) -> Result<()> {
        let mut state = self.state();
        state.logouts += 1;
        if state.fail_logout {
            return Err(Error::TelegramError("AUTH_KEY_UNREGISTERED".to_string()));
        }
        state.authorized = false;
        state.connected = false;
        Ok(())
    }
}
