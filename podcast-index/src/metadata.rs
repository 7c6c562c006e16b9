//! Podcast metadata record returned by the Podcast Index API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// A podcast feed record as returned by `podcasts/byfeedurl` and
/// `podcasts/byfeedid`.
///
/// Fields the API may omit are optional; anything not modeled explicitly
/// lands in [`extra`](Self::extra).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodcastMetadata {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Unix timestamp of the feed's last update.
    #[serde(default)]
    pub last_update_time: Option<i64>,
    /// Unix timestamp of the index's last crawl of the feed.
    #[serde(default)]
    pub last_crawl_time: Option<i64>,
    #[serde(default)]
    pub itunes_id: Option<u64>,
    #[serde(default)]
    pub language: Option<String>,
    /// Category id → category name, as keyed by the API.
    #[serde(default)]
    pub categories: Option<BTreeMap<String, String>>,
    /// All remaining response fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PodcastMetadata {
    /// The podcast's display name: the title, or the feed URL when the
    /// index has no title for it.
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// The last update time as an [`OffsetDateTime`], if present and valid.
    pub fn last_update_datetime(&self) -> Option<OffsetDateTime> {
        self.last_update_time
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
    }

    /// Category names joined with `", "`, or `"Unknown"` when absent.
    pub fn categories_string(&self) -> String {
        match &self.categories {
            Some(categories) if !categories.is_empty() => categories
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            _ => "Unknown".to_string(),
        }
    }
}
