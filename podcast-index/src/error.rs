//! Error taxonomy for the Podcast Index client.

use reqwest::StatusCode;

/// Errors produced by the Podcast Index client.
///
/// A feed that does not exist is **not** an error: lookups return
/// `Ok(None)` in that case.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the credentials (HTTP 401).
    #[error("authentication failed - check API credentials")]
    Auth,

    /// The API returned a non-2xx status or an in-band error reply.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
