//! Campaign state machine
//!
//! `Idle -> Running -> {Stopped | Completed | Failed}`; a terminal state
//! accepts a new `start` just like `Idle` does. At most one campaign runs at
//! a time and it always runs on the worker.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::client::MessagingClient;
use crate::dispatcher::{Campaign, Dispatcher, EventSink, RunOutcome, RunReport, StopFlag};
use crate::error::{Error, Result};
use crate::metrics;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Stopped | RunState::Completed | RunState::Failed
        )
    }

    fn after(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Stopped => RunState::Stopped,
            RunOutcome::Failed(_) => RunState::Failed,
        }
    }
}

#[derive(Debug)]
struct Slot {
    state: RunState,
    stop: StopFlag,
}

pub struct RunController<C: MessagingClient> {
    worker: Worker<C>,
    dispatcher: Arc<Dispatcher>,
    slot: Arc<Mutex<Slot>>,
}

impl<C: MessagingClient> RunController<C> {
    pub fn new(worker: Worker<C>, dispatcher: Dispatcher) -> Self {
        Self {
            worker,
            dispatcher: Arc::new(dispatcher),
            slot: Arc::new(Mutex::new(Slot {
                state: RunState::Idle,
                stop: StopFlag::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Hand the campaign to the worker. Rejected while another one runs.
    pub fn start(&self, campaign: Campaign<C::Handle>, sink: Arc<dyn EventSink>) -> Result<()> {
        let stop = {
            let mut slot = self.lock();
            if slot.state == RunState::Running {
                return Err(Error::CampaignInProgress);
            }
            if self.worker.is_closed() {
                return Err(Error::WorkerStopped);
            }
            slot.state = RunState::Running;
            slot.stop = StopFlag::new();
            slot.stop.clone()
        };

        info!(
            destinations = campaign.len(),
            delay_secs = campaign.delay().as_secs(),
            cooldown_secs = self.dispatcher.failure_cooldown().as_secs(),
            "Starting campaign"
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let mut guard = RunGuard {
            slot: Arc::clone(&self.slot),
            sink,
            total: campaign.len(),
            finished: false,
        };
        let submitted = self.worker.submit(move |client| {
            Box::pin(async move {
                let report = dispatcher
                    .run(client, &campaign, &stop, guard.sink.as_ref())
                    .await;
                guard.finish(report);
            })
        });

        if let Err(err) = submitted {
            self.lock().state = RunState::Idle;
            return Err(err);
        }
        Ok(())
    }

    /// Ask the running campaign to stop before its next destination.
    pub fn request_stop(&self) -> Result<()> {
        let slot = self.lock();
        if slot.state != RunState::Running {
            return Err(Error::NotRunning);
        }
        slot.stop.request();
        info!("Stop requested");
        Ok(())
    }

    /// Fold a terminal state back to `Idle`. Returns the state acknowledged.
    pub fn acknowledge(&self) -> RunState {
        let mut slot = self.lock();
        let previous = slot.state;
        if previous.is_terminal() {
            slot.state = RunState::Idle;
        }
        previous
    }
}

/// Delivers the end of a run exactly once. If the job is dropped before the
/// dispatcher returns (worker aborted or gone), the run ends as `Failed`.
struct RunGuard {
    slot: Arc<Mutex<Slot>>,
    sink: Arc<dyn EventSink>,
    total: usize,
    finished: bool,
}

impl RunGuard {
    fn finish(&mut self, report: RunReport) {
        self.finished = true;
        metrics::record_campaign(report.outcome.label());
        lock_slot(&self.slot).state = RunState::after(&report.outcome);
        self.sink.finished(report);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("Campaign ended without finishing; worker stopped");
        self.finish(RunReport {
            outcome: RunOutcome::Failed(Error::WorkerStopped.to_string()),
            sent: 0,
            failed: 0,
            total: self.total,
        });
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // A panic while holding the lock cannot leave Slot half-written
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
