//! Event processors for the notification pipeline.
//!
//! This module contains the processors that handle events in the system:
//!
//! - `HiveWatcher`: polls Hive blocks, emits `PodpingEvent`
//! - `Dispatcher`: receives `PodpingEvent`, emits `OutboundMessage`

pub mod dispatcher;
pub mod hive_watcher;

pub use dispatcher::{Dispatcher, DispatcherConfig, MetadataProvider, DEFAULT_MESSAGE_FORMAT};
pub use hive_watcher::{HiveWatcher, WatchError, DEFAULT_HIVE_NODES, DEFAULT_POLL_INTERVAL};
