//! Conditional cache tests against a live HTTP server

mod helper;

use std::time::Duration;

use futures::future::join_all;
use mockito::{Matcher, Server};
use tempfile::TempDir;

use helper::silent_server;
use homenet_check::http::{FetchError, HttpFetcher};
use homenet_check::version::cache::{ConditionalCache, Freshness};
use homenet_check::version::error::CacheError;

const KEY: &str = "dataset.csv.gz";

fn setup() -> (TempDir, ConditionalCache, HttpFetcher) {
    let temp_dir = TempDir::new().unwrap();
    let cache = ConditionalCache::new(temp_dir.path());
    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    (temp_dir, cache, fetcher)
}

#[tokio::test]
async fn revalidation_with_etag_does_not_rewrite_payload() {
    let mut server = Server::new_async().await;
    let url = format!("{}/dataset", server.url());
    let (_temp_dir, cache, fetcher) = setup();

    let download = server
        .mock("GET", "/dataset")
        .match_header("if-none-match", Matcher::Missing)
        .with_status(200)
        .with_header("etag", "\"rev-1\"")
        .with_body("first payload")
        .expect(1)
        .create_async()
        .await;
    let revalidate = server
        .mock("GET", "/dataset")
        .match_header("if-none-match", "\"rev-1\"")
        .with_status(304)
        .expect(1)
        .create_async()
        .await;

    let first = cache
        .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
        .await
        .unwrap();
    let modified = std::fs::metadata(&first.path).unwrap().modified().unwrap();

    let second = cache
        .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
        .await
        .unwrap();

    download.assert_async().await;
    revalidate.assert_async().await;
    assert_eq!(first.freshness, Freshness::Downloaded);
    assert_eq!(second.freshness, Freshness::Revalidated);
    assert_eq!(std::fs::read_to_string(&second.path).unwrap(), "first payload");
    assert_eq!(
        std::fs::metadata(&second.path).unwrap().modified().unwrap(),
        modified
    );
}

#[tokio::test]
async fn max_age_keeps_requests_off_the_network() {
    let mut server = Server::new_async().await;
    let url = format!("{}/dataset", server.url());
    let (_temp_dir, cache, fetcher) = setup();

    let mock = server
        .mock("GET", "/dataset")
        .with_status(200)
        .with_header("cache-control", "public, max-age=3600")
        .with_body("payload")
        .expect(1)
        .create_async()
        .await;

    for _ in 0..3 {
        cache
            .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
            .await
            .unwrap();
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_falls_back_to_stale_payload() {
    let mut server = Server::new_async().await;
    let url = format!("{}/dataset", server.url());
    let (_temp_dir, cache, fetcher) = setup();

    let ok = server
        .mock("GET", "/dataset")
        .with_status(200)
        .with_body("payload")
        .expect(1)
        .create_async()
        .await;
    cache
        .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
        .await
        .unwrap();
    ok.assert_async().await;
    ok.remove_async().await;

    let _failing = server
        .mock("GET", "/dataset")
        .with_status(500)
        .create_async()
        .await;

    let result = cache
        .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
        .await
        .unwrap();

    assert_eq!(result.freshness, Freshness::Stale);
    assert_eq!(std::fs::read_to_string(&result.path).unwrap(), "payload");
}

#[tokio::test]
async fn cold_cache_failure_is_retrieval_error() {
    let mut server = Server::new_async().await;
    let url = format!("{}/dataset", server.url());
    let (_temp_dir, cache, fetcher) = setup();

    let _mock = server
        .mock("GET", "/dataset")
        .with_status(503)
        .create_async()
        .await;

    let result = cache
        .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
        .await;

    assert!(matches!(result, Err(CacheError::Retrieval { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_cold_requests_download_once() {
    let mut server = Server::new_async().await;
    let url = format!("{}/dataset", server.url());
    let (_temp_dir, cache, fetcher) = setup();

    let mock = server
        .mock("GET", "/dataset")
        .with_status(200)
        .with_body("payload")
        .expect(1)
        .create_async()
        .await;

    let requests = (0..10).map(|_| cache.get_or_refresh(KEY, |headers| fetcher.get(&url, headers)));
    let results = join_all(requests).await;

    mock.assert_async().await;
    for result in results {
        let payload = result.unwrap();
        assert_eq!(std::fs::read_to_string(&payload.path).unwrap(), "payload");
    }
}

#[tokio::test]
async fn timed_out_refresh_keeps_stored_payload() {
    let mut server = Server::new_async().await;
    let url = format!("{}/dataset", server.url());
    let (_temp_dir, cache, fetcher) = setup();

    let _mock = server
        .mock("GET", "/dataset")
        .with_status(200)
        .with_header("etag", "\"rev-1\"")
        .with_body("payload")
        .create_async()
        .await;
    let first = cache
        .get_or_refresh(KEY, |headers| fetcher.get(&url, headers))
        .await
        .unwrap();
    let modified = std::fs::metadata(&first.path).unwrap().modified().unwrap();

    let slow_url = format!("{}/dataset", silent_server().await);
    let impatient = HttpFetcher::new(Duration::from_millis(100)).unwrap();
    let timed_out = impatient.get(&slow_url, Default::default()).await;
    assert!(matches!(timed_out, Err(FetchError::Timeout { .. })));

    let result = cache
        .get_or_refresh(KEY, |headers| impatient.get(&slow_url, headers))
        .await
        .unwrap();

    assert_eq!(result.freshness, Freshness::Stale);
    assert_eq!(std::fs::read_to_string(&result.path).unwrap(), "payload");
    assert_eq!(
        std::fs::metadata(&result.path).unwrap().modified().unwrap(),
        modified
    );
    assert_eq!(
        cache.load_entry(KEY).await.unwrap().etag.as_deref(),
        Some("\"rev-1\"")
    );
}
