//! End-to-end tests of a single extension update

use crate::common::*;
use extension_archiver::archive::ArchiveFailure;
use extension_archiver::crawler::{update_extension, FetchOutcome};
use extension_archiver::discover::existing_ids;
use extension_archiver::state::ExtensionId;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_first_run_then_not_modified() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ExtensionId::parse("abcdefghijklmnopqrstuvwxyzabcdef").unwrap();
    let tar_path = context.store.layout(&id).tar_path();

    // Run 1: new archive with a full package
    let first = update_extension(&context, &id, run(1), false).await;
    assert!(first.is_new());
    assert!(first.is_ok());
    assert!(!first.not_modified());
    assert_eq!(first.fetches.package, FetchOutcome::Ok);
    assert!(first.archive_failures.is_empty());

    let run1 = run(1).to_string();
    let package_entry = format!("{}/{}/{}", id, run1, PACKAGE_NAME);
    let entries = archive_entries(&tar_path);
    assert!(entries.contains(&format!("{}/{}/overview.html", id, run1)));
    assert!(entries.contains(&format!("{}/{}/overview.html.status", id, run1)));
    assert!(entries.contains(&format!("{}.headers", package_entry)));
    assert!(entries.contains(&format!("{}.url", package_entry)));
    assert_eq!(
        archive_file(&tar_path, &package_entry).unwrap(),
        PACKAGE_BYTES.to_vec()
    );

    // Run 2: conditional request answered 304, recorded as a link
    let second = update_extension(&context, &id, run(2), false).await;
    assert!(!second.is_new());
    assert!(second.is_ok());
    assert!(second.not_modified());
    assert!(second.archive_failures.is_empty());

    let run2 = run(2).to_string();
    let link = archive_file(
        &tar_path,
        &format!("{}/{}/{}.link", id, run2, PACKAGE_NAME),
    )
    .expect("link record");
    assert_eq!(
        String::from_utf8(link).unwrap(),
        format!("../{}/{}\n", run1, PACKAGE_NAME)
    );
    assert_eq!(
        archive_file(&tar_path, &format!("{}/{}/{}.status", id, run2, PACKAGE_NAME)).unwrap(),
        b"304".to_vec()
    );
    assert!(archive_file(&tar_path, &format!("{}/{}/{}", id, run2, PACKAGE_NAME)).is_none());

    assert_eq!(archive_runs(&tar_path), vec![run1, run2]);
    assert!(context.store.layout(&id).backup_path().is_file());
}

#[tokio::test]
async fn test_archive_accumulates_runs() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('b');

    for day in 1..=4 {
        let result = update_extension(&context, &id, run(day), false).await;
        assert!(result.is_ok(), "run {} failed: {:?}", day, result);
    }

    let tar_path = context.store.layout(&id).tar_path();
    let runs = archive_runs(&tar_path);
    assert_eq!(runs.len(), 4);
    assert_eq!(runs[0], run(1).to_string());
    assert_eq!(runs[3], run(4).to_string());
    assert!(!context.store.layout(&id).scratch_dir().exists());
    assert!(!context.store.layout(&id).temp_path().exists());
}

#[tokio::test]
async fn test_rejected_package_is_never_stored() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package_redirect(&server, PACKAGE_NAME).await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", PACKAGE_NAME)))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>please sign in</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('c');

    let result = update_extension(&context, &id, run(1), false).await;
    assert!(matches!(result.fetches.package, FetchOutcome::Rejected(_)));
    assert!(result.has_exception());
    assert!(!result.is_ok());
    assert!(result.needs_rerun());

    let tar_path = context.store.layout(&id).tar_path();
    let base = format!("{}/{}/{}", id, run(1), PACKAGE_NAME);
    assert!(archive_file(&tar_path, &base).is_none());
    assert!(archive_file(&tar_path, &format!("{}.headers", base)).is_some());
    assert!(archive_file(&tar_path, &format!("{}.status", base)).is_some());

    let exception = archive_file(&tar_path, &format!("{}.exception", base)).unwrap();
    let exception = String::from_utf8(exception).unwrap();
    assert!(exception.contains("text/html"));
    assert!(exception.contains("please sign in"));
}

#[tokio::test]
async fn test_missing_content_type_is_rejected() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package_redirect(&server, PACKAGE_NAME).await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", PACKAGE_NAME)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('k');

    let result = update_extension(&context, &id, run(1), false).await;
    assert!(matches!(result.fetches.package, FetchOutcome::Rejected(_)));
    assert!(result.needs_rerun());

    let tar_path = context.store.layout(&id).tar_path();
    let base = format!("{}/{}/{}", id, run(1), PACKAGE_NAME);
    assert!(archive_file(&tar_path, &base).is_none());

    let exception = archive_file(&tar_path, &format!("{}.exception", base)).unwrap();
    assert!(String::from_utf8(exception)
        .unwrap()
        .contains("Did not find Content-Type header"));
}

#[tokio::test]
async fn test_unexpected_file_name_is_rejected() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package_redirect(&server, "download.crx").await;
    Mock::given(method("GET"))
        .and(path("/files/download.crx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-chrome-extension")
                .set_body_bytes(PACKAGE_BYTES),
        )
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('d');

    let result = update_extension(&context, &id, run(1), false).await;
    assert!(matches!(result.fetches.package, FetchOutcome::Rejected(_)));

    let tar_path = context.store.layout(&id).tar_path();
    let base = format!("{}/{}/download.crx", id, run(1));
    assert!(archive_file(&tar_path, &base).is_none());
    assert!(archive_file(&tar_path, &format!("{}.exception", base)).is_some());
}

#[tokio::test]
async fn test_delisted_extension() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('e');

    let result = update_extension(&context, &id, run(1), false).await;
    assert_eq!(result.fetches.overview, FetchOutcome::NotFound);
    assert!(result.not_in_store());
    assert!(!result.is_ok());
    assert!(!result.has_exception());

    // The failed observation is still archived
    let tar_path = context.store.layout(&id).tar_path();
    assert_eq!(
        archive_file(&tar_path, &format!("{}/{}/overview.html.status", id, run(1))).unwrap(),
        b"404".to_vec()
    );
}

#[tokio::test]
async fn test_unreachable_store_records_exceptions() {
    // Nothing listens on a port that was released again
    let root = tempfile::tempdir().unwrap();
    let context = create_context_at(&unused_local_base(), root.path());

    let id = ext('f');
    let result = update_extension(&context, &id, run(1), false).await;
    assert!(matches!(result.fetches.overview, FetchOutcome::TransientError(_)));
    assert!(result.has_exception());
    assert!(result.needs_rerun());

    let tar_path = context.store.layout(&id).tar_path();
    assert!(archive_file(&tar_path, &format!("{}/{}/overview.html.exception", id, run(1))).is_some());
}

#[tokio::test]
async fn test_corrupt_archive_is_quarantined() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('g');
    let layout = context.store.layout(&id);

    std::fs::create_dir_all(layout.shard_dir()).unwrap();
    std::fs::write(layout.tar_path(), vec![0xAB; 4096]).unwrap();

    let result = update_extension(&context, &id, run(2), false).await;
    assert!(result.corrupt_archive());
    assert!(result.is_ok());
    assert!(layout.corrupt_path(&run(2)).is_file());

    let entries = archive_entries(&layout.tar_path());
    assert!(entries.contains(&format!("{}/{}/overview.html", id, run(2))));
    assert!(entries.contains(&format!(
        "{}/{}/{}.corrupt.{}.exception",
        id,
        run(2),
        id,
        run(2)
    )));
    assert_eq!(archive_runs(&layout.tar_path()), vec![run(2).to_string()]);
}

#[tokio::test]
async fn test_forum_pages() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;
    mount_forums(&server, 200, 200).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('h');

    let result = update_extension(&context, &id, run(1), true).await;
    assert!(result.is_ok());
    assert_eq!(result.fetches.reviews, Some(FetchOutcome::Ok));
    assert_eq!(result.fetches.support, Some(FetchOutcome::Ok));

    let tar_path = context.store.layout(&id).tar_path();
    for artifact in [
        "reviews000-099.text",
        "reviews100-199.text",
        "support000-099.text",
        "support100-199.text",
    ] {
        let entry = format!("{}/{}/{}", id, run(1), artifact);
        assert!(archive_file(&tar_path, &entry).is_some(), "missing {}", entry);
    }
}

#[tokio::test]
async fn test_throttled_forum_is_rate_limited() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;
    mount_forums(&server, 200, 503).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('i');

    let result = update_extension(&context, &id, run(1), true).await;
    assert_eq!(result.fetches.support, Some(FetchOutcome::RateLimited));
    assert!(result.rate_limited());
    assert!(!result.is_ok());
}

#[tokio::test]
async fn test_forum_requests_page_through_the_thread() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;
    mount_forums(&server, 200, 200).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    update_extension(&context, &ext('j'), run(1), true).await;

    let offsets: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/reviews")
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .collect();

    assert_eq!(offsets.len(), 2);
    assert!(offsets[0].contains("startindex%22%3A%220%22"));
    assert!(offsets[1].contains("startindex%22%3A%22100%22"));
}

#[tokio::test]
async fn test_same_second_updates_keep_both_snapshots() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('l');
    let tar_path = context.store.layout(&id).tar_path();

    let first = update_extension(&context, &id, run(1), false).await;
    let second = update_extension(&context, &id, run(1), false).await;

    assert_eq!(first.run, run(1));
    assert_eq!(second.run, run(1).next_second());
    assert!(second.is_ok());
    assert!(second.not_modified());
    assert!(second.archive_failures.is_empty());

    let run1 = run(1).to_string();
    assert_eq!(archive_runs(&tar_path), vec![run1.clone(), second.run.to_string()]);
    assert_eq!(
        archive_file(&tar_path, &format!("{}/{}/{}", id, run1, PACKAGE_NAME)).unwrap(),
        PACKAGE_BYTES.to_vec()
    );
    assert_eq!(
        archive_file(&tar_path, &format!("{}/{}/{}.status", id, run1, PACKAGE_NAME)).unwrap(),
        b"200".to_vec()
    );
}

#[tokio::test]
async fn test_lone_backup_is_restored() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('m');
    let layout = context.store.layout(&id);

    update_extension(&context, &id, run(1), false).await;
    update_extension(&context, &id, run(2), false).await;
    std::fs::rename(layout.tar_path(), layout.backup_path()).unwrap();

    let third = update_extension(&context, &id, run(3), false).await;
    assert!(!third.is_new());
    assert!(third.is_ok());
    assert!(third.archive_failures.is_empty());
    assert_eq!(
        archive_runs(&layout.tar_path()),
        vec![run(1).to_string(), run(2).to_string(), run(3).to_string()]
    );
    assert!(layout.backup_path().is_file());
}

#[tokio::test]
async fn test_failed_repack_leaves_backup_for_next_update() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('n');
    let layout = context.store.layout(&id);

    update_extension(&context, &id, run(1), false).await;

    // The packer cannot create its temporary file over a directory
    std::fs::create_dir_all(layout.temp_path()).unwrap();
    let second = update_extension(&context, &id, run(2), false).await;

    assert!(second.archive_failed());
    assert!(matches!(
        second.archive_failures.as_slice(),
        [ArchiveFailure::Repack { .. }]
    ));
    assert!(second.needs_rerun());
    assert!(!layout.tar_path().exists());
    assert!(!layout.scratch_dir().exists());
    assert_eq!(archive_runs(&layout.backup_path()), vec![run(1).to_string()]);
    assert_eq!(existing_ids(root.path()), vec![id.clone()]);

    // The snapshot of the failed run is gone; everything before it survives
    std::fs::remove_dir(layout.temp_path()).unwrap();
    let third = update_extension(&context, &id, run(3), false).await;
    assert!(!third.is_new());
    assert!(third.archive_failures.is_empty());
    assert_eq!(
        archive_runs(&layout.tar_path()),
        vec![run(1).to_string(), run(3).to_string()]
    );
}

#[tokio::test]
async fn test_backup_rename_failure_is_recorded() {
    let server = MockServer::start().await;
    mount_overview(&server).await;
    mount_package(&server).await;

    let root = tempfile::tempdir().unwrap();
    let context = create_context(&server, root.path());
    let id = ext('o');
    let layout = context.store.layout(&id);

    update_extension(&context, &id, run(1), false).await;

    // A directory in the backup's place can be neither removed nor replaced
    std::fs::remove_file(layout.backup_path()).ok();
    std::fs::create_dir_all(layout.backup_path()).unwrap();
    std::fs::write(layout.backup_path().join("keep"), b"").unwrap();

    let second = update_extension(&context, &id, run(2), false).await;
    assert!(second.is_ok());
    assert!(matches!(
        second.archive_failures.as_slice(),
        [ArchiveFailure::BackupRename { .. }]
    ));
    assert!(second.needs_rerun());

    let tar_path = layout.tar_path();
    assert_eq!(archive_runs(&tar_path), vec![run(1).to_string(), run(2).to_string()]);
    let sidecar = format!("{}/{}/{}.tar.rename.exception", id, run(2), id);
    let exception = archive_file(&tar_path, &sidecar).expect("rename exception");
    assert!(String::from_utf8(exception).unwrap().contains("backup"));
}
