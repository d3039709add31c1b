#![forbid(unsafe_code)]

//! Configuration for collections and executors.
//!
//! Both configs follow the same shape: a `Default`, chained `with_*`
//! setters, an optional `from_env()` overlay, and `validate()` which reports
//! bad values as [`CollectionError::InvalidArgument`].
//!
//! Environment variables:
//!
//! | Variable                | Effect                                    |
//! |-------------------------|-------------------------------------------|
//! | `SYNCOL_LABEL`          | [`CollectionConfig::label`]               |
//! | `SYNCOL_TRACE_CHANGES`  | `1`/`true` enables per-change trace events |
//! | `SYNCOL_EXECUTOR_QUEUE` | [`ExecutorConfig::queue_capacity`]        |

use std::env;

use crate::error::{CollectionError, Result};

/// Default name of the executor worker thread.
pub const DEFAULT_EXECUTOR_THREAD: &str = "syncol-executor";

/// Default capacity of the executor job queue.
pub const DEFAULT_EXECUTOR_QUEUE: usize = 64;

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|val| val == "1" || val.eq_ignore_ascii_case("true"))
}

/// Per-collection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Name attached to this collection's log events.
    pub label: Option<String>,
    /// Emit a `collection.change` trace event per notification.
    pub trace_changes: bool,
}

impl CollectionConfig {
    /// Defaults overlaid with `SYNCOL_LABEL` and `SYNCOL_TRACE_CHANGES`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(label) = env::var("SYNCOL_LABEL") {
            config.label = Some(label);
        }
        if let Some(enabled) = env_flag("SYNCOL_TRACE_CHANGES") {
            config.trace_changes = enabled;
        }
        config
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_trace_changes(mut self, enabled: bool) -> Self {
        self.trace_changes = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.label {
            Some(label) if label.trim().is_empty() => {
                Err(CollectionError::invalid("collection label must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Settings for [`ThreadExecutor`](crate::executor::ThreadExecutor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Name of the worker thread.
    pub thread_name: String,
    /// Jobs that may wait in the queue before `run_sync` callers block on
    /// submission.
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_EXECUTOR_THREAD.to_string(),
            queue_capacity: DEFAULT_EXECUTOR_QUEUE,
        }
    }
}

impl ExecutorConfig {
    /// Defaults overlaid with `SYNCOL_EXECUTOR_QUEUE`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("SYNCOL_EXECUTOR_QUEUE")
            && let Ok(n) = val.parse()
        {
            config.queue_capacity = n;
        }
        config
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name.trim().is_empty() {
            return Err(CollectionError::invalid(
                "executor thread name must not be empty",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(CollectionError::invalid(
                "executor queue capacity must be at least 1",
            ));
        }
        Ok(())
    }
}
