#![forbid(unsafe_code)]

//! Synchronized collections: the episode lock, the synchronizer, the
//! change-notifying collection (direct and executor-marshaled), mirroring,
//! and read-only projection.

pub mod collection;
pub mod episode;
pub mod mirror;
pub mod read_only;
pub mod synchronizer;

pub use collection::{CollectionBuilder, Element, SyncCollection};
pub use episode::{EpisodeGuard, EpisodeLock, WriteEpisode};
pub use read_only::ReadOnlyView;
pub use synchronizer::Synchronizer;
