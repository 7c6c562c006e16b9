//! Async client library for the Podcast Index API.
//!
//! Provides a typed HTTP client for fetching podcast metadata by feed URL
//! or feed id, plus a bounded-concurrency batch lookup.
//!
//! # Modules
//!
//! - [`client`] — the [`PodcastIndexClient`]
//! - [`metadata`] — the [`PodcastMetadata`] record returned by lookups
//! - [`error`] — the [`Error`] taxonomy

pub mod client;
pub mod error;
pub mod metadata;

pub use client::PodcastIndexClient;
pub use error::Error;
pub use metadata::PodcastMetadata;

/// Production Podcast Index API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.podcastindex.org/api/1.0";
