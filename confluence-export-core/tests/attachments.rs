use confluence_export_core::attachments::{
    candidate_addresses, AddressStrategy, AttachmentRef, AttachmentResolver, AttachmentStore,
    Resolution,
};
use confluence_export_core::contract::MockAttachmentFetcher;
use confluence_export_core::error::FetchError;
use confluence_export_core::model::AttachmentDescriptor;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn descriptor(id: &str, filename: &str, page: &str, candidates: &[&str]) -> AttachmentDescriptor {
    AttachmentDescriptor {
        id: id.to_string(),
        filename: filename.to_string(),
        parent_document_id: page.to_string(),
        candidate_addresses: candidates.iter().map(|c| c.to_string()).collect(),
        size_bytes: None,
        uploaded_at: None,
        uploaded_by: None,
        download_url: None,
    }
}

fn not_found(address: &str) -> FetchError {
    FetchError::Status {
        url: address.to_string(),
        status: 404,
    }
}

#[test]
fn test_candidate_addresses_follow_strategy_order() {
    let reference = AttachmentRef {
        id: "att1",
        filename: "my file.png",
        container_id: "42",
        download_link: Some("/download/attachments/42/my%20file.png?version=1"),
    };
    let addresses = candidate_addresses(
        "https://x.atlassian.net/wiki/",
        &reference,
        &AddressStrategy::DEFAULT,
    );
    assert_eq!(
        addresses,
        vec![
            "https://x.atlassian.net/wiki/download/attachments/42/my%20file.png?version=1",
            "https://x.atlassian.net/wiki/rest/api/content/att1/data",
            "https://x.atlassian.net/wiki/download/attachments/42/my%20file.png",
            "https://x.atlassian.net/download/attachments/42/my%20file.png",
        ]
    );
}

#[test]
fn test_candidate_addresses_skip_unusable_strategies() {
    let reference = AttachmentRef {
        id: "att1",
        filename: "a.txt",
        container_id: "",
        download_link: None,
    };
    let addresses = candidate_addresses(
        "https://x.atlassian.net/wiki",
        &reference,
        &AddressStrategy::DEFAULT,
    );
    assert_eq!(
        addresses,
        vec!["https://x.atlassian.net/wiki/rest/api/content/att1/data"]
    );
}

#[tokio::test]
async fn test_first_successful_candidate_wins() {
    let dir = tempdir().unwrap();
    let mut store = AttachmentStore::open(dir.path().join("attachments")).unwrap();

    let mut fetcher = MockAttachmentFetcher::new();
    fetcher
        .expect_fetch()
        .times(2)
        .returning(|address: &str| {
            if address.ends_with("/1") {
                Err(not_found(address))
            } else {
                Ok(address.as_bytes().to_vec())
            }
        });

    let desc = descriptor(
        "a1",
        "notes.txt",
        "page-1",
        &["https://h/1", "https://h/2", "https://h/3"],
    );
    let resolution = AttachmentResolver::new(&fetcher)
        .resolve(&desc, &mut store)
        .await
        .unwrap();

    let Resolution::Resolved(resolved) = resolution else {
        panic!("expected the attachment to resolve");
    };
    assert_eq!(resolved.local_name, "notes.txt");
    assert_eq!(resolved.size_bytes, "https://h/2".len() as u64);
    assert_eq!(fs::read_to_string(&resolved.local_path).unwrap(), "https://h/2");
}

#[tokio::test]
async fn test_exhausted_candidates_are_not_found() {
    let dir = tempdir().unwrap();
    let mut store = AttachmentStore::open(dir.path().join("attachments")).unwrap();

    let mut fetcher = MockAttachmentFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|address: &str| Err(not_found(address)));

    let desc = descriptor("a1", "gone.png", "page-1", &["https://h/1", "https://h/2"]);
    let resolution = AttachmentResolver::new(&fetcher)
        .resolve(&desc, &mut store)
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::NotFound);
    assert!(!store.dir().join("gone.png").exists());
}

#[tokio::test]
async fn test_same_filename_on_two_pages_is_deduplicated() {
    let dir = tempdir().unwrap();
    let attachments_dir = dir.path().join("attachments");
    let mut store = AttachmentStore::open(&attachments_dir).unwrap();

    let mut fetcher = MockAttachmentFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|address: &str| Ok(address.as_bytes().to_vec()));

    let descriptors = vec![
        descriptor("a1", "logo.png", "page-a", &["https://h/a/logo.png"]),
        descriptor("b1", "logo.png", "page-b", &["https://h/b/logo.png"]),
    ];
    let outcome = AttachmentResolver::new(&fetcher)
        .with_concurrency(4)
        .resolve_all(&descriptors, &mut store)
        .await;

    assert_eq!(outcome.index.len(), 2);
    assert!(outcome.unresolved.is_empty());
    assert_eq!(
        fs::read_to_string(attachments_dir.join("logo.png")).unwrap(),
        "https://h/a/logo.png"
    );
    assert_eq!(
        fs::read_to_string(attachments_dir.join("logo_1.png")).unwrap(),
        "https://h/b/logo.png"
    );

    // scoped lookups find each page's own file, the bare name maps to the last write
    let a = outcome.index.get_for_document("page-a", "logo.png").unwrap();
    let b = outcome.index.get_for_document("page-b", "logo.png").unwrap();
    assert_eq!(a.local_name, "logo.png");
    assert_eq!(b.local_name, "logo_1.png");
    assert_eq!(outcome.index.get("logo.png").unwrap().local_name, "logo_1.png");
}

#[tokio::test]
async fn test_resolve_all_keeps_descriptor_order_and_reports_failures() {
    let dir = tempdir().unwrap();
    let mut store = AttachmentStore::open(dir.path().join("attachments")).unwrap();

    let mut fetcher = MockAttachmentFetcher::new();
    fetcher.expect_fetch().returning(|address: &str| {
        if address.contains("missing") {
            Err(not_found(address))
        } else {
            Ok(vec![1, 2, 3])
        }
    });

    let descriptors = vec![
        descriptor("1", "one.bin", "p", &["https://h/one"]),
        descriptor("2", "two.bin", "p", &["https://h/missing"]),
        descriptor("3", "three.bin", "p", &["https://h/three"]),
    ];
    let outcome = AttachmentResolver::new(&fetcher)
        .with_concurrency(3)
        .resolve_all(&descriptors, &mut store)
        .await;

    let names: Vec<&str> = outcome.index.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["one.bin", "three.bin"]);
    assert_eq!(outcome.unresolved.len(), 1);
    assert_eq!(outcome.unresolved[0].filename, "two.bin");
    assert_eq!(outcome.write_failures, 0);
}

#[tokio::test]
async fn test_store_sanitizes_names_and_protects_summary_file() {
    let dir = tempdir().unwrap();
    let mut store = AttachmentStore::open(dir.path().join("attachments")).unwrap();

    let (name, path) = store.write("my: diagram?.png", b"x").unwrap();
    assert_eq!(name, "my__diagram_.png");
    assert!(path.exists());

    let (readme, _) = store.write("README.md", b"user file").unwrap();
    assert_eq!(readme, "README_1.md");

    let (fallback, _) = store.write("...", b"x").unwrap();
    assert_eq!(fallback, "attachment");
}

#[tokio::test]
async fn test_abort_flag_stops_new_downloads() {
    let dir = tempdir().unwrap();
    let mut store = AttachmentStore::open(dir.path().join("attachments")).unwrap();

    let mut fetcher = MockAttachmentFetcher::new();
    fetcher.expect_fetch().never();

    let descriptors = vec![descriptor("1", "one.bin", "p", &["https://h/one"])];
    let outcome = AttachmentResolver::new(&fetcher)
        .with_abort_flag(Arc::new(AtomicBool::new(true)))
        .resolve_all(&descriptors, &mut store)
        .await;
    assert!(outcome.index.is_empty());
    assert!(outcome.unresolved.is_empty());
}
