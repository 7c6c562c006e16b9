//! HTTP-level tests for the Podcast Index client, backed by wiremock.

use podcast_index::{Error, PodcastIndexClient};
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> PodcastIndexClient {
    let base = Url::parse(&server.uri()).expect("mock server uri parses");
    PodcastIndexClient::with_base_url(base, "test-key", "test-secret")
}

#[tokio::test]
async fn lookup_by_feed_url_returns_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .and(query_param("url", "https://example.com/feed.xml"))
        .and(header("X-Auth-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "true",
            "feed": {
                "id": 42,
                "title": "Example Show",
                "url": "https://example.com/feed.xml",
                "language": "en"
            },
            "description": "Found matching feed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let meta = client
        .lookup_by_feed_url("https://example.com/feed.xml")
        .await
        .expect("lookup succeeds")
        .expect("feed is found");

    assert_eq!(meta.id, 42);
    assert_eq!(meta.title, "Example Show");
    assert_eq!(meta.display_name(), "Example Show");
}

#[tokio::test]
async fn lookup_by_feed_id_hits_byfeedid_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedid"))
        .and(query_param("id", "920666"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "true",
            "feed": { "id": 920666, "title": "Podcasting 2.0", "url": "https://example.com/pc20.xml" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let meta = client
        .lookup_by_feed_id(920666)
        .await
        .expect("lookup succeeds")
        .expect("feed is found");
    assert_eq!(meta.id, 920666);
}

#[tokio::test]
async fn not_found_is_none_not_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "false",
            "description": "Feed url not found."
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .lookup_by_feed_url("https://nowhere.invalid/feed.xml")
        .await
        .expect("not-found is not an error");
    assert!(result.is_none());
}

#[tokio::test]
async fn empty_feed_array_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "true",
            "feed": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .lookup_by_feed_url("https://example.com/feed.xml")
        .await
        .expect("empty feed list is not an error");
    assert!(result.is_none());
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .lookup_by_feed_url("https://example.com/feed.xml")
        .await
        .expect_err("401 is an error");
    assert!(matches!(err, Error::Auth));
}

#[tokio::test]
async fn in_band_error_maps_to_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "false",
            "description": "Daily quota exceeded"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .lookup_by_feed_url("https://example.com/feed.xml")
        .await
        .expect_err("in-band failure is an error");
    match err {
        Error::Api { body, .. } => assert_eq!(body, "Daily quota exceeded"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn lookup_multiple_collects_hits_and_misses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .and(query_param("url", "https://example.com/a.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "true",
            "feed": { "id": 1, "title": "A", "url": "https://example.com/a.xml" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/podcasts/byfeedurl"))
        .and(query_param("url", "https://example.com/b.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "false",
            "description": "Feed url not found."
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let urls = vec![
        "https://example.com/a.xml".to_string(),
        "https://example.com/b.xml".to_string(),
    ];
    let results = client.lookup_multiple(&urls).await;

    assert_eq!(results.len(), 2);
    assert!(results["https://example.com/a.xml"].is_some());
    assert!(results["https://example.com/b.xml"].is_none());
}
