#![forbid(unsafe_code)]

//! Executors that run a job synchronously on a designated context.
//!
//! A marshaled collection hands the data-touching half of every write
//! episode to an [`Executor`] and blocks until it has run. Two executors are
//! provided:
//!
//! - [`InlineExecutor`] runs the job on the calling thread.
//! - [`ThreadExecutor`] owns a dedicated, named worker thread and is the only
//!   place its jobs run. Calls made from the worker itself run inline, so a
//!   job may marshal further work without deadlocking.
//!
//! # Failure Modes
//!
//! - **Job panics**: the panic is caught on the worker, carried back, and
//!   resumed on the calling thread. The worker keeps running.
//! - **Worker gone**: once the executor has shut down, `run_sync` returns
//!   [`CollectionError::ExecutorUnavailable`] without running the job.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;

use crate::config::ExecutorConfig;
use crate::error::{CollectionError, Result};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs to completion on a designated execution context.
pub trait Executor: Send + Sync {
    /// Run `job` on this executor's context and return once it has finished.
    fn run_sync(&self, job: Job) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn run_sync(&self, job: Job) -> Result<()> {
        (**self).run_sync(job)
    }
}

/// Run `f` through `executor` and hand back its result.
pub fn run_on<R, F>(executor: &dyn Executor, f: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let slot = Arc::new(Mutex::new(None));
    let job_slot = Arc::clone(&slot);
    executor.run_sync(Box::new(move || {
        *job_slot.lock() = Some(f());
    }))?;
    let result = slot.lock().take();
    result.ok_or(CollectionError::ExecutorUnavailable)
}

/// Runs every job on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn run_sync(&self, job: Job) -> Result<()> {
        job();
        Ok(())
    }
}

enum Msg {
    Run {
        job: Job,
        done: mpsc::SyncSender<thread::Result<()>>,
    },
    Shutdown,
}

/// Executor backed by one dedicated worker thread.
pub struct ThreadExecutor {
    sender: mpsc::SyncSender<Msg>,
    handle: Mutex<Option<JoinHandle<()>>>,
    worker: ThreadId,
    name: String,
}

impl ThreadExecutor {
    /// Spawn the worker thread described by `config`.
    pub fn start(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = mpsc::sync_channel::<Msg>(config.queue_capacity);

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_loop(rx))
            .map_err(|err| {
                tracing::warn!(message = "executor.spawn_failed", error = %err);
                CollectionError::ExecutorUnavailable
            })?;

        tracing::debug!(
            message = "executor.start",
            thread = %config.thread_name,
            queue = config.queue_capacity
        );

        Ok(Self {
            sender: tx,
            worker: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
            name: config.thread_name,
        })
    }

    /// Start with [`ExecutorConfig::default`].
    pub fn with_defaults() -> Result<Self> {
        Self::start(ExecutorConfig::default())
    }

    /// Whether the caller is running on this executor's worker thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker
    }

    #[must_use]
    pub fn thread_name(&self) -> &str {
        &self.name
    }

    /// Finish queued jobs, then stop the worker. Later `run_sync` calls fail
    /// with [`CollectionError::ExecutorUnavailable`].
    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.sender.send(Msg::Shutdown);
        if self.is_current() {
            // The worker exits after this job returns; it cannot join itself.
            return;
        }
        if handle.join().is_err() {
            tracing::warn!(message = "executor.worker_panicked", thread = %self.name);
        }
        tracing::debug!(message = "executor.stop", thread = %self.name);
    }
}

impl Executor for ThreadExecutor {
    fn run_sync(&self, job: Job) -> Result<()> {
        if self.is_current() {
            job();
            return Ok(());
        }
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        if self
            .sender
            .send(Msg::Run { job, done: done_tx })
            .is_err()
        {
            tracing::warn!(message = "executor.job_dropped", thread = %self.name);
            return Err(CollectionError::ExecutorUnavailable);
        }
        match done_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => {
                tracing::warn!(message = "executor.job_dropped", thread = %self.name);
                Err(CollectionError::ExecutorUnavailable)
            }
        }
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadExecutor")
            .field("thread", &self.name)
            .field("running", &self.handle.lock().is_some())
            .finish()
    }
}

fn worker_loop(rx: mpsc::Receiver<Msg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            Msg::Run { job, done } => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                // The caller may have unwound already; nothing to report then.
                let _ = done.send(outcome);
            }
            Msg::Shutdown => break,
        }
    }
}
