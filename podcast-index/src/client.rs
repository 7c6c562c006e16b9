//! HTTP client for the Podcast Index API.
//!
//! Authentication follows the Podcast Index scheme: every request carries
//!
//! - `X-Auth-Date` — the current unix time,
//! - `X-Auth-Key` — the API key,
//! - `Authorization` — `sha1_hex(api_key + api_secret + unix_time)`.
//!
//! "Not found" replies are swallowed and surfaced as `Ok(None)`; every
//! other failure maps onto [`Error`].

use std::collections::HashMap;

use futures_util::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::Error;
use crate::metadata::PodcastMetadata;
use crate::DEFAULT_BASE_URL;

/// User agent sent with every API request.
pub const USER_AGENT: &str = concat!("podcast-index-rs/", env!("CARGO_PKG_VERSION"));

/// Concurrency bound for [`PodcastIndexClient::lookup_multiple`].
const MAX_CONCURRENT_LOOKUPS: usize = 5;

/// Typed HTTP client for the Podcast Index API.
///
/// Cloning is cheap (the underlying `reqwest::Client` is pooled). There is
/// no explicit close operation: dropping the last clone releases the
/// connection pool.
#[derive(Debug, Clone)]
pub struct PodcastIndexClient {
    http: Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
}

impl PodcastIndexClient {
    /// Create a client against the production endpoint.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self::with_base_url(
            Url::parse(DEFAULT_BASE_URL)?,
            api_key,
            api_secret,
        ))
    }

    /// Create a client against a custom base URL (e.g. a test server).
    pub fn with_base_url(
        base_url: Url,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET podcasts/byfeedurl` — look up a podcast by feed URL.
    ///
    /// Returns `Ok(None)` when the feed is not in the index.
    pub async fn lookup_by_feed_url(
        &self,
        feed_url: &str,
    ) -> Result<Option<PodcastMetadata>, Error> {
        self.get_feed("podcasts/byfeedurl", &[("url", feed_url)])
            .await
    }

    /// `GET podcasts/byfeedid` — look up a podcast by Podcast Index feed id.
    ///
    /// Returns `Ok(None)` when the id is not in the index.
    pub async fn lookup_by_feed_id(
        &self,
        feed_id: u64,
    ) -> Result<Option<PodcastMetadata>, Error> {
        self.get_feed("podcasts/byfeedid", &[("id", &feed_id.to_string())])
            .await
    }

    /// Look up many feeds concurrently, at most [`MAX_CONCURRENT_LOOKUPS`]
    /// requests in flight.
    ///
    /// Individual failures are logged and mapped to `None` so one bad feed
    /// cannot sink the batch.
    pub async fn lookup_multiple(
        &self,
        feed_urls: &[String],
    ) -> HashMap<String, Option<PodcastMetadata>> {
        stream::iter(feed_urls.iter().map(|url| async move {
            let result = match self.lookup_by_feed_url(url).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to look up podcast");
                    None
                }
            };
            (url.clone(), result)
        }))
        .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
        .collect()
        .await
    }

    async fn get_feed(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<PodcastMetadata>, Error> {
        let url = Url::parse(&format!(
            "{}/{path}",
            self.base_url.as_str().trim_end_matches('/')
        ))?;

        let unix_time = time::OffsetDateTime::now_utc().unix_timestamp();
        let resp = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("X-Auth-Date", unix_time.to_string())
            .header("X-Auth-Key", &self.api_key)
            .header(
                "Authorization",
                auth_token(&self.api_key, &self.api_secret, unix_time),
            )
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Auth);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        let envelope: serde_json::Value = resp.json().await?;

        // The API signals failures in-band with status:"false"; a "not
        // found" description is an absent result, not an error.
        if envelope.get("status").and_then(serde_json::Value::as_str) == Some("false") {
            let description = envelope
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if description.to_lowercase().contains("not found") {
                return Ok(None);
            }
            return Err(Error::Api {
                status,
                body: description.to_string(),
            });
        }

        // `feed` is an object when found, and null / absent / an empty
        // array when not.
        match envelope.get("feed") {
            Some(feed @ serde_json::Value::Object(_)) => {
                Ok(Some(serde_json::from_value(feed.clone())?))
            }
            _ => Ok(None),
        }
    }
}

/// `sha1_hex(api_key + api_secret + unix_time)` — the Podcast Index
/// `Authorization` header value.
fn auth_token(api_key: &str, api_secret: &str, unix_time: i64) -> String {
    let input = format!("{api_key}{api_secret}{unix_time}");
    let digest = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, input.as_bytes());
    hex::encode(digest.as_ref())
}
