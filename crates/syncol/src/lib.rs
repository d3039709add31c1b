#![forbid(unsafe_code)]

//! syncol public facade crate.
//!
//! Thread-safe, change-notifying ordered collections that can be mirrored
//! into derived collections and projected read-only.
//!
//! ```
//! use syncol::prelude::*;
//!
//! let names = SyncCollection::from_vec(vec!["ada".to_string()]);
//! let lengths = names.mirror_map(|name: &String| name.len()).unwrap();
//! names.add("grace".to_string()).unwrap();
//! assert_eq!(lengths.to_vec(), vec![3, 5]);
//! ```

pub use syncol_collections as collections;
pub use syncol_core as core;

pub mod prelude {
    pub use syncol_collections::{
        CollectionBuilder, Element, ReadOnlyView, SyncCollection, Synchronizer,
    };
    pub use syncol_core::{
        ChangeKind, CollectionChange, CollectionConfig, CollectionError, Comparer, Disposable,
        Executor, ExecutorConfig, FnComparer, InlineExecutor, Listener, ListenerRegistry,
        NaturalOrder, PropertyChange, ThreadExecutor,
    };
}
