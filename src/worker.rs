//! Single background worker that owns the messaging client
//!
//! Every network operation (login steps, group enumeration, campaign runs)
//! is a job executed here, strictly one at a time in submission order.
//! Callers never touch the client directly.

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::MessagingClient;
use crate::error::{Error, Result};

type Job<C> = Box<dyn for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send>;

/// Handle for submitting jobs. Cloning it shares the same worker.
pub struct Worker<C> {
    jobs: mpsc::UnboundedSender<Job<C>>,
}

impl<C> Clone for Worker<C> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<C: MessagingClient> Worker<C> {
    /// Start the worker task. It runs until every handle is dropped, then
    /// disconnects the client and hands it back through the join handle.
    pub fn spawn(client: C) -> (Self, JoinHandle<C>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<C>>();

        let task = tokio::spawn(async move {
            let mut client = client;
            while let Some(job) = rx.recv().await {
                job(&mut client).await;
            }

            if client.is_connected().await {
                if let Err(err) = client.disconnect().await {
                    warn!("Failed to disconnect on shutdown: {}", err);
                }
            }
            debug!("Worker stopped");
            client
        });

        (Self { jobs: tx }, task)
    }

    /// Queue a job without waiting for it.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send + 'static,
    {
        self.jobs
            .send(Box::new(job))
            .map_err(|_| Error::WorkerStopped)
    }

    /// Queue a job and wait for its result.
    pub async fn call<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |client| {
            Box::pin(async move {
                let output = job(client).await;
                let _ = tx.send(output);
            })
        })?;
        rx.await.map_err(|_| Error::WorkerStopped)
    }

    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }
}
