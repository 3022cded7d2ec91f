//! Sitemap discovery against a mock store

use crate::common::*;
use extension_archiver::discover::discover_ids;
use extension_archiver::state::ExtensionId;
use extension_archiver::ArchiverError;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sitemap(locations: &[String]) -> String {
    let entries: String = locations
        .iter()
        .map(|loc| format!("  <sitemap><loc>{}</loc></sitemap>\n", loc.replace('&', "&amp;")))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</sitemapindex>",
        entries
    )
}

fn shard(base: &str, ids: &[ExtensionId]) -> String {
    let entries: String = ids
        .iter()
        .map(|id| format!("  <url><loc>{}/detail/some-extension/{}</loc></url>\n", base, id))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</urlset>",
        entries
    )
}

#[tokio::test]
async fn test_discover_ids_from_shards() {
    let server = MockServer::start().await;
    let base = server.uri();

    for (index, ids) in [(0, vec![ext('a'), ext('b')]), (1, vec![ext('b'), ext('c')])] {
        Mock::given(method("GET"))
            .and(path("/sitemap"))
            .and(query_param("shard", index.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(shard(&base, &ids)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let index = sitemap(&[
        format!("{}/sitemap?shard=0&numshards=2", base),
        format!("{}/sitemap?shard=1&numshards=2", base),
        format!("{}/sitemap?hl=de&shard=1", base),
    ]);
    Mock::given(method("GET"))
        .and(path("/sitemap"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index))
        .mount(&server)
        .await;

    let client = extension_archiver::crawler::build_http_client(&user_agent(), Duration::from_secs(5))
        .unwrap();
    let ids = discover_ids(&client, &endpoints(&server)).await.unwrap();

    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![ext('a'), ext('b'), ext('c')]);
}

#[tokio::test]
async fn test_discover_fails_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = extension_archiver::crawler::build_http_client(&user_agent(), Duration::from_secs(5))
        .unwrap();
    let result = discover_ids(&client, &endpoints(&server)).await;

    assert!(matches!(result, Err(ArchiverError::Discovery(_))));
}
