//! Live-item status verification.
//!
//! A podping with reason `live` or `liveEnd` claims something about the
//! feed's `<podcast:liveItem>` state. This module fetches the feed and
//! checks the claim, so the dispatcher can attach a follow-up note when
//! the feed disagrees.
//!
//! Feeds use assorted namespace prefixes for the podcast namespace, so
//! the scan matches `liveItem` by local name only.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use thiserror::Error;

use crate::events::PodpingReason;

/// Errors that can occur while checking a feed's live status.
#[derive(Debug, Error)]
pub enum LiveCheckError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The fetch exceeded the configured timeout.
    #[error("feed fetch timed out")]
    Timeout,

    /// The feed host answered with a non-2xx status.
    #[error("feed returned HTTP {0}")]
    Status(u16),

    /// The feed body is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Fetch `feed_url` and report whether any `liveItem` element currently
/// has `status="live"`.
///
/// Redirects are followed. One `timeout` budget covers the whole fetch,
/// headers and body together.
pub async fn feed_has_live_item(
    client: &reqwest::Client,
    feed_url: &str,
    timeout: Duration,
) -> Result<bool, LiveCheckError> {
    let fetch = async {
        let response = client.get(feed_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LiveCheckError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    };

    let body = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| LiveCheckError::Timeout)??;

    scan_for_live_item(&body)
}

/// Scan feed XML for any `liveItem` element with `status="live"`,
/// regardless of namespace prefix.
pub fn scan_for_live_item(xml: &str) -> Result<bool, LiveCheckError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                if element.name().local_name().as_ref() != b"liveItem" {
                    continue;
                }
                for attr in element.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"status" {
                        let value = attr.unescape_value().unwrap_or_default();
                        if value.eq_ignore_ascii_case("live") {
                            return Ok(true);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(false)
}

/// The follow-up note for a live/liveEnd podping, given the observed feed
/// state (`None` when the feed could not be checked).
///
/// Returns `None` when the feed agrees with the podping and no note is
/// needed. Non-live reasons never produce a note.
pub fn verification_note(reason: &PodpingReason, live: Option<bool>) -> Option<String> {
    match (reason, live) {
        (PodpingReason::Live | PodpingReason::LiveEnd, None) => {
            Some("Warning: could not verify liveItem status".to_string())
        }
        (PodpingReason::Live, Some(false)) => Some(
            "Error: feed has no liveItem with status='live' but reason is 'live'".to_string(),
        ),
        (PodpingReason::LiveEnd, Some(true)) => Some(
            "Error: feed has liveItem with status='live' but reason is 'liveEnd'".to_string(),
        ),
        _ => None,
    }
}
