//! Tests for artifact storage backends

use prometheus_mcp_cluster::infra::{ArtifactStore, InMemoryStore, LocalDirStore};

#[tokio::test]
async fn test_local_store_writes_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::new(dir.path().join("artifacts"));

    let saved = store.save_binary(b"\x89PNG", "shot.png", "image/png").await;
    assert!(saved.success, "{saved:?}");
    let path = saved.location.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");

    let text = store.save_text("<main/>", "../page.html", "text/html").await;
    assert!(text.success);
    assert!(dir.path().join("artifacts").join("page.html").exists());

    let empty = store.save_text("", "empty.html", "text/html").await;
    assert!(!empty.success);
    assert!(empty.error.is_some());
}

#[tokio::test]
async fn test_save_file_uploads_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("capture.png");
    std::fs::write(&source, b"pixels").unwrap();

    let store = InMemoryStore::new();
    let saved = store.save_file(&source, "uploaded.png", "image/png").await;
    assert_eq!(saved.location.as_deref(), Some("memory://uploaded.png"));
    assert_eq!(store.get("uploaded.png").unwrap().data, b"pixels");

    let missing = store.save_file(&dir.path().join("nope.png"), "x.png", "image/png").await;
    assert!(!missing.success);
    assert_eq!(store.names(), vec!["uploaded.png".to_string()]);
}
