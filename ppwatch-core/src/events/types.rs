//! Event type definitions for the notification pipeline.

/// Reason attached to a podping notification.
///
/// Podping payloads carry the reason as a free-form string; the values
/// below are the ones defined by the podping namespace, everything else
/// is preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodpingReason {
    /// The feed content changed.
    Update,
    /// A live item in the feed went live.
    Live,
    /// A live item in the feed ended.
    LiveEnd,
    /// Any reason string this crate does not know about.
    Other(String),
}

impl From<&str> for PodpingReason {
    fn from(value: &str) -> Self {
        match value {
            "update" => PodpingReason::Update,
            "live" => PodpingReason::Live,
            "liveEnd" => PodpingReason::LiveEnd,
            other => PodpingReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for PodpingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodpingReason::Update => write!(f, "update"),
            PodpingReason::Live => write!(f, "live"),
            PodpingReason::LiveEnd => write!(f, "liveEnd"),
            PodpingReason::Other(other) => write!(f, "{other}"),
        }
    }
}

impl PodpingReason {
    /// Whether this reason requires live-item verification of the feed.
    pub fn is_live_transition(&self) -> bool {
        matches!(self, PodpingReason::Live | PodpingReason::LiveEnd)
    }
}

/// A podping notification extracted from a Hive block.
///
/// Emitted by the `HiveWatcher` and consumed by the `Dispatcher`.
#[derive(Debug, Clone)]
pub struct PodpingEvent {
    /// Hive transaction id carrying the custom_json operation.
    pub trx_id: String,
    /// Block the transaction was included in.
    pub block_num: u32,
    /// Why the feeds were pinged.
    pub reason: PodpingReason,
    /// Feed URLs (IRIs) named by the podping.
    pub urls: Vec<String>,
}

/// A formatted message bound for one IRC channel.
///
/// Emitted by the `Dispatcher` and consumed by the IRC delivery layer,
/// which paces sends for flood protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target channel, including the leading `#`.
    pub channel: String,
    /// Message body, ready to send.
    pub body: String,
}
