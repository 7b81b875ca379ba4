//! Background Job Execution
//!
//! Queries execute off the caller's thread. [`JobQueue`] is the transport
//! seam: creation ends with the query id handed to `enqueue`, and some
//! worker later picks the id up and calls [`QueryService::perform`]. The
//! id is the entire payload, so any transport that can carry a string can
//! carry a job.
//!
//! [`JobRunner`] is the bundled in-process transport: an unbounded channel
//! fanned out to a pool of OS threads. The channel delivers each id to
//! exactly one worker; transports that redeliver are still safe because
//! `perform` skips any query already past `created`.

use crossbeam_channel as channel;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

use crate::query::{Query, QueryResult, QueryService};

/// Failure to hand a query id to the job transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct QueueError {
    message: String,
}

impl QueueError {
    pub fn new(message: impl Into<String>) -> Self {
        QueueError {
            message: message.into(),
        }
    }
}

/// Transport carrying query ids from creation to execution
pub trait JobQueue: Send + Sync {
    /// Hands off a query id for asynchronous execution.
    fn enqueue(&self, id: &str) -> Result<(), QueueError>;
}

/// In-process worker pool executing queued queries
///
/// Workers block on the shared channel and run one query at a time.
/// [`shutdown`](Self::shutdown) disconnects the channel, which lets the
/// workers drain every id already queued before they stop.
pub struct JobRunner {
    service: Arc<QueryService>,
    tx: Option<channel::Sender<String>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobRunner {
    /// Starts `threads` workers over the given service; `0` means one per
    /// available CPU.
    pub fn start(service: Arc<QueryService>, threads: usize) -> QueryResult<Self> {
        let threads = if threads == 0 {
            num_cpus::get()
        } else {
            threads
        };
        let (tx, rx) = channel::unbounded::<String>();

        let mut workers = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let rx = rx.clone();
            let service = Arc::clone(&service);
            let handle = std::thread::Builder::new()
                .name(format!("query-worker-{worker_id}"))
                .spawn(move || {
                    Self::worker_loop(worker_id, &rx, &service);
                })
                .map_err(|e| QueueError::new(format!("failed to spawn worker thread: {e}")))?;
            workers.push(handle);
        }

        tracing::info!(threads, "job_runner_started");
        Ok(JobRunner {
            service,
            tx: Some(tx),
            workers,
        })
    }

    fn worker_loop(worker_id: usize, rx: &channel::Receiver<String>, service: &QueryService) {
        while let Ok(id) = rx.recv() {
            tracing::debug!(worker_id, id = %id, "job_received");
            if let Err(e) = service.perform(&id) {
                tracing::error!(worker_id, id = %id, error = %e, "job_failed");
            }
        }
        // recv fails only once the channel is disconnected and drained
        tracing::debug!(worker_id, "worker_stopped");
    }

    /// Creates a query for `statement` and enqueues it in one step. The
    /// returned query carries its assigned id and `created` status; poll
    /// [`QueryService::find`] for progress.
    pub fn submit(&self, statement: impl Into<String>) -> QueryResult<Query> {
        let mut query = self.service.query(statement);
        self.service.create(&mut query)?;
        if let Some(id) = query.id() {
            self.enqueue(id)?;
        }
        Ok(query)
    }

    /// The service this runner executes against.
    pub fn service(&self) -> Arc<QueryService> {
        Arc::clone(&self.service)
    }

    /// Stops accepting work, drains everything already queued, and joins
    /// the workers.
    pub fn shutdown(mut self) -> Result<(), QueueError> {
        self.tx.take();
        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        for handle in workers {
            handle
                .join()
                .map_err(|_| QueueError::new("worker thread panicked"))?;
        }
        tracing::info!(workers = count, "job_runner_stopped");
        Ok(())
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        self.tx.take();
        for handle in std::mem::take(&mut self.workers) {
            let _ = handle.join();
        }
    }
}

impl JobQueue for JobRunner {
    fn enqueue(&self, id: &str) -> Result<(), QueueError> {
        let Some(tx) = &self.tx else {
            return Err(QueueError::new("job runner is shut down"));
        };
        tx.send(id.to_string())
            .map_err(|_| QueueError::new("job channel disconnected"))?;
        tracing::debug!(id, "job_enqueued");
        Ok(())
    }
}
