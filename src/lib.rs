//! Telegram Group Sender Library
//!
//! This library provides tools to:
//! - Keep a list of Telegram accounts (API credentials per phone number)
//! - Log an account in with a one-time code and keep its session file
//! - Load every group chat of the account
//! - Broadcast one message to all of them with a fixed delay, a cool-down
//!   after failed sends, and a stop request honoured between groups

pub mod accounts;
pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod session;
pub mod telegram;
pub mod worker;

// Re-export common types
pub use accounts::{AccountCredentials, AccountStore};
pub use auth::{AccountSession, LoginStatus, LogoutStatus};
pub use client::{Destination, MessagingClient};
pub use config::Config;
pub use controller::{RunController, RunState};
pub use dispatcher::{
    parse_delay, Campaign, CampaignEvent, Dispatcher, EventSink, RunOutcome, RunReport, StopFlag,
};
pub use error::{Error, Result};
pub use session::{SessionLock, SessionPaths};
pub use telegram::TelegramClient;
pub use worker::Worker;
