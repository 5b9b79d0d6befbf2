//! Broadcast one message to every group of an account
//!
//! Ctrl+C asks the running campaign to stop before its next group; a second
//! Ctrl+C abandons it without waiting for the current send.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::OpenAccount;
use crate::config::Config;
use crate::client::MessagingClient;
use crate::controller::RunController;
use crate::dispatcher::{parse_delay, Campaign, CampaignEvent, Dispatcher, RunOutcome, RunReport};
use crate::error::{Error, Result};
use crate::session::{check_session_exists, SessionPaths};

pub struct SendArgs {
    pub phone: String,
    pub message: Option<String>,
    pub message_file: Option<PathBuf>,
    pub delay: Option<String>,
}

pub async fn run(args: SendArgs) -> Result<()> {
    let config = Config::new();
    let message = read_message(&args)?;
    let delay_secs = match args.delay.as_deref() {
        Some(raw) => parse_delay(raw)?,
        None => config.default_delay_secs,
    };

    check_session_exists(&SessionPaths::from_config(&config), &args.phone)?;
    let account = OpenAccount::open(&config, &args.phone)?;
    let result = send(&account, &config, &message, delay_secs).await;
    match result {
        Err(Error::Interrupted) => account.abort(),
        _ => account.close().await,
    }

    let report = result?;
    if let RunOutcome::Failed(reason) = &report.outcome {
        return Err(Error::TelegramError(reason.clone()));
    }
    Ok(())
}

/// Message text from the flag or the file, rejected when blank.
fn read_message(args: &SendArgs) -> Result<String> {
    let text = match (&args.message, &args.message_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => String::new(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(Error::validation("Message cannot be empty."));
    }
    Ok(text.to_string())
}

/// First Ctrl+C requests a stop; the next one gives up on the run.
pub fn handle_interrupt<C: MessagingClient>(
    controller: &RunController<C>,
    interrupts: &mut u32,
) -> Result<()> {
    *interrupts += 1;
    if *interrupts > 1 {
        println!("Interrupted, abandoning the current send.");
        return Err(Error::Interrupted);
    }

    println!("Stopping after the current group... (Ctrl+C again to abort)");
    if let Err(err) = controller.request_stop() {
        warn!("Stop request ignored: {}", err);
    }
    Ok(())
}

async fn send(
    account: &OpenAccount,
    config: &Config,
    message: &str,
    delay_secs: u64,
) -> Result<RunReport> {
    account.require_authorized().await?;

    println!("Connecting to Telegram and fetching groups...");
    let groups = account.session.load_groups().await?;
    println!("Successfully loaded {} groups.", groups.len());

    let campaign = Campaign::new(message, delay_secs, groups)?;
    let total = campaign.len();

    let controller = RunController::new(
        account.session.worker().clone(),
        Dispatcher::from_config(config),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    println!("--- Starting sending process (Delay: {}s) ---", delay_secs);
    controller.start(campaign, Arc::new(tx))?;

    let mut sent = 0usize;
    let mut interrupts = 0u32;
    let mut listening = true;
    let report = loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(CampaignEvent::Log(line)) => print_line(&line),
                Some(CampaignEvent::Progress) => {
                    sent += 1;
                    println!("   Sent: {}/{}", sent, total);
                }
                Some(CampaignEvent::Finished(report)) => {
                    controller.acknowledge();
                    break report;
                }
                None => return Err(Error::WorkerStopped),
            },
            signal = tokio::signal::ctrl_c(), if listening => match signal {
                Ok(()) => handle_interrupt(&controller, &mut interrupts)?,
                Err(err) => {
                    warn!("Failed to listen for Ctrl+C: {}", err);
                    listening = false;
                }
            },
        }
    };
    drop(controller);

    match &report.outcome {
        RunOutcome::Failed(reason) => {
            println!("❌ Critical Error during sending: {}", reason);
        }
        outcome => {
            info!(
                outcome = outcome.label(),
                sent = report.sent,
                failed = report.failed,
                "Sending finished"
            );
            println!(
                "\nSent {} of {} groups ({} failed).",
                report.sent, report.total, report.failed
            );
        }
    }
    Ok(report)
}

fn print_line(line: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
}
