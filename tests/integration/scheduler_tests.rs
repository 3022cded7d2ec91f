//! Batch scheduling against a mock store

use crate::common::*;
use extension_archiver::crawler::{update_batch, Scheduler};
use extension_archiver::discover::existing_ids;
use std::collections::BTreeSet;
use std::sync::Arc;
use wiremock::MockServer;

#[tokio::test]
async fn test_batch_updates_each_id_once_forums_first() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;
    mount_forums(&server, 200, 200).await;

    let root = tempfile::tempdir().unwrap();
    let context = Arc::new(create_context(&server, root.path()));
    let scheduler = Scheduler::new(context, 3);

    let full = vec![ext('a'), ext('b'), ext('c'), ext('d'), ext('b'), ext('e'), ext('f')];
    let forum = vec![ext('c'), ext('z')];

    let results = scheduler.update_batch(&full, &forum).await;

    assert_eq!(results.len(), 6);
    assert_eq!(results[0].id, ext('c'));
    assert!(results[0].fetches.reviews.is_some());
    assert!(results[1..].iter().all(|r| r.fetches.reviews.is_none()));

    let seen: BTreeSet<_> = results.iter().map(|r| r.id.clone()).collect();
    let expected: BTreeSet<_> = full.iter().cloned().collect();
    assert_eq!(seen, expected);
    assert!(results.iter().all(|r| r.is_ok() && r.is_new()));

    let archived: BTreeSet<_> = existing_ids(root.path()).into_iter().collect();
    assert_eq!(archived, expected);
}

#[tokio::test]
async fn test_update_batch_from_config() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, root.path());
    let ids: Vec<_> = "0123456789".chars().map(ext).collect();

    let results = update_batch(&config, &ids, &[]).await.unwrap();

    assert_eq!(results.len(), ids.len());
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(existing_ids(root.path()), ids);
}

#[tokio::test]
async fn test_empty_batch() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(Arc::new(create_context(&server, root.path())), 4);

    let results = scheduler.update_batch(&[], &[ext('a')]).await;

    assert!(results.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
