#![forbid(unsafe_code)]

//! Core: change notifications, signals, listeners, executors, and errors
//! shared by syncol collections.

pub mod change;
pub mod comparer;
pub mod config;
pub mod error;
pub mod executor;
pub mod listener;
pub mod signal;

pub use change::{ChangeKind, CollectionChange, PropertyChange};
pub use comparer::{Comparer, FnComparer, NaturalOrder};
pub use config::{CollectionConfig, ExecutorConfig};
pub use error::{CollectionError, Result};
pub use executor::{Executor, InlineExecutor, Job, ThreadExecutor, run_on};
pub use listener::{Disposable, Listener, ListenerRegistry};
pub use signal::Signal;
