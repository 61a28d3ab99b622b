//! Storage façade tests against a mock S3 endpoint.
//!
//! Exercises listing (pagination), metadata lookups, and batched deletes
//! over real HTTP using wiremock, with a `custom` provider pointed at the
//! mock server.

use std::sync::Arc;

use futures::TryStreamExt;
use pushduck_storage::{
    DeleteByPrefixOptions, ListFilesQuery, ProviderConfig, ProviderKind, ProviderSettings,
    SortBy, Storage,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "test-bucket";

async fn storage_for(server: &MockServer) -> Storage {
    let config = ProviderConfig::resolve_with(
        ProviderKind::Custom,
        ProviderSettings {
            endpoint: Some(server.uri()),
            bucket: Some(BUCKET.to_string()),
            region: Some("us-east-1".to_string()),
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        },
        |_| None,
    )
    .expect("mock provider config");
    Storage::new(Arc::new(config))
}

fn list_page(keys: &[(&str, u64)], next_token: Option<&str>) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult>"#);
    match next_token {
        Some(token) => {
            xml.push_str("<IsTruncated>true</IsTruncated>");
            xml.push_str(&format!(
                "<NextContinuationToken>{token}</NextContinuationToken>"
            ));
        }
        None => xml.push_str("<IsTruncated>false</IsTruncated>"),
    }
    for (key, size) in keys {
        xml.push_str(&format!(
            "<Contents><Key>{key}</Key><Size>{size}</Size>\
             <LastModified>2024-03-01T10:00:00.000Z</LastModified>\
             <ETag>&quot;etag-{size}&quot;</ETag></Contents>"
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml
}

#[tokio::test]
async fn test_list_files_returns_one_page_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "av/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_page(&[("av/a.png", 10), ("av/b.png", 20)], Some("t1"))),
        )
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;
    let listing = storage
        .list()
        .files(ListFilesQuery {
            prefix: Some("av/".to_string()),
            sort_by: Some(SortBy::Size),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(listing.files.len(), 2);
    assert_eq!(listing.next_token.as_deref(), Some("t1"));
    assert_eq!(listing.files[0].key, "av/a.png");
    assert_eq!(listing.files[0].size, 10);
    assert_eq!(listing.files[0].etag.as_deref(), Some("etag-10"));
    // Path-style public URL against the custom endpoint.
    assert_eq!(
        listing.files[0].url,
        format!("{}/{BUCKET}/av/a.png", server.uri())
    );
}

#[tokio::test]
async fn test_stream_walks_all_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("continuation-token", "t1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(list_page(&[("c.txt", 3)], None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_page(&[("a.txt", 1), ("b.txt", 2)], Some("t1"))),
        )
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;
    let all: Vec<_> = storage.list().stream(None).try_collect().await.unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(all[2].key, "c.txt");
}

#[tokio::test]
async fn test_by_extension_filters_case_insensitively() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(
            &[("a.PNG", 1), ("b.pdf", 2), ("nested/c.png", 3)],
            None,
        )))
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;
    let pngs = storage.list().by_extension("png", None).await.unwrap();

    let keys: Vec<_> = pngs.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["a.PNG", "nested/c.png"]);
}

#[tokio::test]
async fn test_metadata_info_and_exists() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/present.pdf")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"abc\"")
                .insert_header("content-type", "application/pdf")
                .insert_header("last-modified", "Fri, 01 Mar 2024 10:00:00 GMT"),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/missing.pdf")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;

    let info = storage.metadata().info("present.pdf").await.unwrap();
    assert_eq!(info.etag.as_deref(), Some("abc"));
    assert_eq!(info.content_type.as_deref(), Some("application/pdf"));
    assert!(info.last_modified.is_some());

    assert!(storage.metadata().exists("present.pdf").await.unwrap());
    assert!(!storage.metadata().exists("missing.pdf").await.unwrap());
}

#[tokio::test]
async fn test_delete_files_chunks_at_batch_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("delete", ""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<DeleteResult><Deleted><Key>k</Key></Deleted></DeleteResult>"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;
    let keys: Vec<String> = (0..1200).map(|i| format!("bulk/{i}")).collect();
    let summary = storage.delete().files(&keys).await.unwrap();

    // One <Deleted> entry per request, two requests for 1200 keys.
    assert_eq!(summary.deleted.len(), 2);
    server.verify().await;
}

#[tokio::test]
async fn test_delete_by_prefix_dry_run_deletes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("prefix", "tmp/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_page(&[("tmp/a", 1), ("tmp/b", 2)], None)),
        )
        .mount(&server)
        .await;
    // No POST mock mounted: a real delete would fail the test.

    let storage = storage_for(&server).await;
    let outcome = storage
        .delete()
        .by_prefix(
            "tmp/",
            DeleteByPrefixOptions {
                dry_run: true,
                max_files: None,
            },
        )
        .await
        .unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.matched, vec!["tmp/a", "tmp/b"]);
    assert_eq!(outcome.deleted, 0);
}

#[tokio::test]
async fn test_delete_by_prefix_respects_max_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(
            &[("tmp/a", 1), ("tmp/b", 2), ("tmp/c", 3)],
            None,
        )))
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;
    let outcome = storage
        .delete()
        .by_prefix(
            "tmp/",
            DeleteByPrefixOptions {
                dry_run: true,
                max_files: Some(2),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.matched.len(), 2);
}

#[tokio::test]
async fn test_api_error_surfaces_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
        ))
        .mount(&server)
        .await;

    let storage = storage_for(&server).await;
    let err = storage
        .list()
        .files(ListFilesQuery::default())
        .await
        .unwrap_err();

    let text = err.to_string();
    assert!(text.contains("403"));
    assert!(text.contains("Access Denied"));
}
