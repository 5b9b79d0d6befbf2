//! Bulk-send loop
//!
//! Sends one message to every destination of a campaign in order. A failed
//! destination is logged, cooled down and skipped; the stop flag is checked
//! before each destination; events go to an [`EventSink`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::{Destination, MessagingClient};
use crate::config::{Config, FAILURE_COOLDOWN_SECS};
use crate::error::{Error, Result};
use crate::metrics;

pub const STOPPED_LINE: &str = "--- Process stopped by user! ---";
pub const COMPLETED_LINE: &str = "--- All messages sent successfully! ---";

/// One validated send run: message, delay and ordered destinations.
#[derive(Debug, Clone)]
pub struct Campaign<H> {
    message: String,
    delay: Duration,
    destinations: Vec<Destination<H>>,
}

impl<H> Campaign<H> {
    /// Rejects an empty message or an empty destination list.
    pub fn new(message: &str, delay_secs: u64, destinations: Vec<Destination<H>>) -> Result<Self> {
        if destinations.is_empty() {
            return Err(Error::validation("No groups loaded. Check connection."));
        }

        let message = message.trim();
        if message.is_empty() {
            return Err(Error::validation("Message cannot be empty."));
        }

        Ok(Self {
            message: message.to_string(),
            delay: Duration::from_secs(delay_secs),
            destinations,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn destinations(&self) -> &[Destination<H>] {
        &self.destinations
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Parse the delay typed by the user: whole, non-negative seconds.
pub fn parse_delay(raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::validation("Invalid delay value. Please use a number."))
}

/// Cooperative cancellation flag. Once requested it stays requested.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed(String),
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Stopped => "stopped",
            RunOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of one run with its counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

impl RunReport {
    fn new(total: usize) -> Self {
        Self {
            outcome: RunOutcome::Completed,
            sent: 0,
            failed: 0,
            total,
        }
    }
}

/// Observer of a running campaign. Called from the worker task.
pub trait EventSink: Send + Sync {
    fn log(&self, line: String);

    fn progress(&self);

    fn finished(&self, report: RunReport);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignEvent {
    Log(String),
    Progress,
    Finished(RunReport),
}

/// Forwards events to whoever holds the receiver; a closed receiver drops them.
impl EventSink for mpsc::UnboundedSender<CampaignEvent> {
    fn log(&self, line: String) {
        let _ = self.send(CampaignEvent::Log(line));
    }

    fn progress(&self) {
        let _ = self.send(CampaignEvent::Progress);
    }

    fn finished(&self, report: RunReport) {
        let _ = self.send(CampaignEvent::Finished(report));
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    failure_cooldown: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(FAILURE_COOLDOWN_SECS))
    }
}

impl Dispatcher {
    pub fn new(failure_cooldown: Duration) -> Self {
        Self { failure_cooldown }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.failure_cooldown())
    }

    pub fn failure_cooldown(&self) -> Duration {
        self.failure_cooldown
    }

    /// Run the campaign to completion, stop, or a failure to connect.
    pub async fn run<C: MessagingClient>(
        &self,
        client: &mut C,
        campaign: &Campaign<C::Handle>,
        stop: &StopFlag,
        sink: &dyn EventSink,
    ) -> RunReport {
        let mut report = RunReport::new(campaign.len());

        let outcome = match self
            .send_all(client, campaign, stop, sink, &mut report)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Campaign failed: {}", err);
                RunOutcome::Failed(err.to_string())
            }
        };
        report.outcome = outcome;

        info!(
            outcome = report.outcome.label(),
            sent = report.sent,
            failed = report.failed,
            total = report.total,
            "Campaign finished"
        );
        report
    }

    async fn send_all<C: MessagingClient>(
        &self,
        client: &mut C,
        campaign: &Campaign<C::Handle>,
        stop: &StopFlag,
        sink: &dyn EventSink,
        report: &mut RunReport,
    ) -> Result<RunOutcome> {
        if !client.is_connected().await {
            client.connect().await?;
        }

        info!(
            destinations = campaign.len(),
            delay_secs = campaign.delay().as_secs(),
            "Campaign started"
        );

        for destination in campaign.destinations() {
            if stop.is_requested() {
                sink.log(STOPPED_LINE.to_string());
                return Ok(RunOutcome::Stopped);
            }

            match client
                .send_message(&destination.handle, campaign.message())
                .await
            {
                Ok(()) => {
                    report.sent += 1;
                    metrics::record_message(true);
                    debug!(title = %destination.title, "Message sent");
                    sink.log(format!("✅ Sent to: {}", destination.title));
                    sink.progress();

                    if !campaign.delay().is_zero() {
                        sleep(campaign.delay()).await;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    metrics::record_message(false);
                    warn!(title = %destination.title, "Send failed: {}", err);
                    sink.log(format!("❌ Error sending to {}: {}", destination.title, err));
                    sleep(self.failure_cooldown).await;
                }
            }
        }

        sink.log(COMPLETED_LINE.to_string());
        Ok(RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::time::Instant;

    /// Client whose sends fail for selected handles and which can trip the
    /// stop flag after a given number of sends.
    #[derive(Default)]
    struct ScriptedClient {
        connected: bool,
        fail_connect: bool,
        failing: HashSet<&'static str>,
        attempts: Vec<&'static str>,
        stop_after: Option<(usize, StopFlag)>,
    }

    #[async_trait]
    impl MessagingClient for ScriptedClient {
        type Handle = &'static str;
        type CodeToken = ();

        async fn connect(&mut self) -> Result<()> {
            if self.fail_connect {
                return Err(Error::TelegramError("connection refused".to_string()));
            }
            self.connected = true;
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            self.connected
        }

        async fn is_authorized(&mut self) -> Result<bool> {
            Ok(true)
        }

        async fn request_code(&mut self, _phone: &str) -> Result<()> {
            Ok(())
        }

        async fn sign_in(&mut self, _phone: &str, _code: &str, _token: ()) -> Result<()> {
            Ok(())
        }

        async fn list_group_dialogs(&mut self) -> Result<Vec<Destination<&'static str>>> {
            Ok(Vec::new())
        }

        async fn send_message(&mut self, destination: &&'static str, _text: &str) -> Result<()> {
            self.attempts.push(*destination);
            if let Some((after, flag)) = &self.stop_after {
                if self.attempts.len() == *after {
                    flag.request();
                }
            }
            if self.failing.contains(destination) {
                return Err(Error::TelegramError(format!("{} is read-only", destination)));
            }
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }

        async fn log_out(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn groups(n: usize) -> Vec<Destination<&'static str>> {
        const IDS: [&str; 5] = ["g1", "g2", "g3", "g4", "g5"];
        IDS.iter()
            .take(n)
            .enumerate()
            .map(|(i, id)| Destination::new(*id, format!("Group {}", i + 1)))
            .collect()
    }

    async fn run_collecting(
        client: &mut ScriptedClient,
        campaign: &Campaign<&'static str>,
        stop: &StopFlag,
    ) -> (RunReport, Vec<CampaignEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = Dispatcher::default().run(client, campaign, stop, &tx).await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (report, events)
    }

    #[test]
    fn campaign_rejects_empty_message() {
        let err = Campaign::new("   \n", 0, groups(1)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Message cannot be empty.");
    }

    #[test]
    fn campaign_rejects_empty_destinations() {
        let err = Campaign::<&str>::new("hi", 0, Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "No groups loaded. Check connection.");
    }

    #[test]
    fn campaign_trims_message() {
        let campaign = Campaign::new("  hello\n", 3, groups(2)).unwrap();
        assert_eq!(campaign.message(), "hello");
        assert_eq!(campaign.delay(), Duration::from_secs(3));
        assert_eq!(campaign.len(), 2);
    }

    #[test]
    fn parse_delay_accepts_whole_seconds() {
        assert_eq!(parse_delay("60").unwrap(), 60);
        assert_eq!(parse_delay(" 0 ").unwrap(), 0);
    }

    #[test]
    fn parse_delay_rejects_non_numbers() {
        for raw in ["", "abc", "-1", "1.5"] {
            let err = parse_delay(raw).unwrap_err();
            assert_eq!(err.to_string(), "Invalid delay value. Please use a number.");
        }
    }

    #[test]
    fn stop_flag_is_monotone_and_shared() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_requested());

        clone.request();
        clone.request();
        assert!(flag.is_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn connects_lazily_before_first_send() {
        let mut client = ScriptedClient::default();
        let campaign = Campaign::new("hi", 0, groups(1)).unwrap();

        let (report, _) = run_collecting(&mut client, &campaign, &StopFlag::new()).await;

        assert!(client.connected);
        assert_eq!(report.outcome, RunOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_ends_run_as_failed() {
        let mut client = ScriptedClient {
            fail_connect: true,
            ..Default::default()
        };
        let campaign = Campaign::new("hi", 0, groups(2)).unwrap();

        let (report, events) = run_collecting(&mut client, &campaign, &StopFlag::new()).await;

        assert!(matches!(report.outcome, RunOutcome::Failed(ref e) if e.contains("connection refused")));
        assert!(client.attempts.is_empty());
        assert!(events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_requested_mid_run_skips_remaining_destinations() {
        let stop = StopFlag::new();
        let mut client = ScriptedClient {
            connected: true,
            stop_after: Some((2, stop.clone())),
            ..Default::default()
        };
        let campaign = Campaign::new("hi", 0, groups(5)).unwrap();

        let (report, events) = run_collecting(&mut client, &campaign, &stop).await;

        assert_eq!(client.attempts, vec!["g1", "g2"]);
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.sent, 2);
        assert_eq!(events.last(), Some(&CampaignEvent::Log(STOPPED_LINE.to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn success_waits_configured_delay_between_sends() {
        let mut client = ScriptedClient {
            connected: true,
            ..Default::default()
        };
        let campaign = Campaign::new("hi", 30, groups(3)).unwrap();

        let started = Instant::now();
        let (report, _) = run_collecting(&mut client, &campaign, &StopFlag::new()).await;

        assert_eq!(report.sent, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(90) && elapsed < Duration::from_secs(91));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_uses_cooldown_instead_of_delay() {
        let mut client = ScriptedClient {
            connected: true,
            failing: HashSet::from(["g2"]),
            ..Default::default()
        };
        let campaign = Campaign::new("hi", 10, groups(2)).unwrap();

        let started = Instant::now();
        let (report, _) = run_collecting(&mut client, &campaign, &StopFlag::new()).await;

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_cooldown_is_honoured() {
        let mut client = ScriptedClient {
            connected: true,
            failing: HashSet::from(["g1"]),
            ..Default::default()
        };
        let campaign = Campaign::new("hi", 0, groups(1)).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        Dispatcher::new(Duration::from_secs(2))
            .run(&mut client, &campaign, &StopFlag::new(), &tx)
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_receiver_does_not_break_the_loop() {
        let mut client = ScriptedClient {
            connected: true,
            ..Default::default()
        };
        let campaign = Campaign::new("hi", 0, groups(3)).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let report = Dispatcher::default()
            .run(&mut client, &campaign, &StopFlag::new(), &tx)
            .await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(client.attempts.len(), 3);
    }

    #[test]
    fn cooldown_comes_from_config() {
        assert_eq!(Dispatcher::default().failure_cooldown(), Duration::from_secs(5));

        let config = Config {
            failure_cooldown_secs: 12,
            ..Config::default()
        };
        assert_eq!(
            Dispatcher::from_config(&config).failure_cooldown(),
            Duration::from_secs(12)
        );
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(RunOutcome::Completed.label(), "completed");
        assert_eq!(RunOutcome::Stopped.label(), "stopped");
        assert_eq!(RunOutcome::Failed("x".into()).label(), "failed");
    }
}
