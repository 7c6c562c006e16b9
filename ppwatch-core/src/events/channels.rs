//! Event channel factories and handles.
//!
//! Provides factory functions for creating event channels with appropriate
//! buffer sizes for the notification pipeline.

use super::types::{OutboundMessage, PodpingEvent};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// Podpings arrive in bursts of a few dozen URLs per block; this buffer
/// absorbs bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for PodpingEvent events.
pub type PodpingEventSender = mpsc::Sender<PodpingEvent>;
/// Receiver handle for PodpingEvent events.
pub type PodpingEventReceiver = mpsc::Receiver<PodpingEvent>;

/// Sender handle for OutboundMessage events.
pub type OutboundMessageSender = mpsc::Sender<OutboundMessage>;
/// Receiver handle for OutboundMessage events.
pub type OutboundMessageReceiver = mpsc::Receiver<OutboundMessage>;

/// Create a new PodpingEvent channel.
///
/// Returns a (sender, receiver) pair; the watcher holds the sender and
/// the dispatcher the receiver.
pub fn podping_event_channel() -> (PodpingEventSender, PodpingEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new OutboundMessage channel.
///
/// Returns a (sender, receiver) pair; the dispatcher holds the sender and
/// the IRC delivery loop the receiver.
pub fn outbound_message_channel() -> (OutboundMessageSender, OutboundMessageReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
