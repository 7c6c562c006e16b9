//! Event system for the notification pipeline.
//!
//! This module provides event types and channel infrastructure for
//! the asynchronous processing pipeline.
//!
//! # Event Flow
//!
//! 1. `HiveWatcher` emits `PodpingEvent` -> `Dispatcher`
//! 2. `Dispatcher` emits `OutboundMessage` -> IRC delivery layer
//!
//! Events are ephemeral: nothing is persisted, a message that cannot be
//! delivered is logged and dropped.

pub mod channels;
pub mod types;

pub use channels::{
    outbound_message_channel, podping_event_channel, OutboundMessageReceiver,
    OutboundMessageSender, PodpingEventReceiver, PodpingEventSender, DEFAULT_CHANNEL_BUFFER,
};

pub use types::{OutboundMessage, PodpingEvent, PodpingReason};
