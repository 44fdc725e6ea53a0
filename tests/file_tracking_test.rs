//! Tracked File Integration Tests
//!
//! Tests for auxiliary files owners hand to the registry:
//! - Write-through on add / write
//! - Cache lookups and explicit reloads
//! - Path validation
//! - Untracking

mod common;

use common::{TestFixture, write_raw};
use std::path::PathBuf;
use uniconf::{Error, FileOptions};

#[tokio::test]
async fn test_add_file_writes_and_caches() {
    let fixture = TestFixture::new();

    fixture
        .registry
        .add_file("42", "notes.txt", "hello", FileOptions::new())
        .await
        .unwrap();

    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "notes.txt")
        .unwrap();
    assert_eq!(&*cached, "hello");

    let on_disk = std::fs::read_to_string(fixture.file_path("42", "notes.txt")).unwrap();
    assert_eq!(on_disk, "hello");
}

#[tokio::test]
async fn test_nested_paths_are_listed() {
    let fixture = TestFixture::new();

    fixture
        .registry
        .add_file("42", "templates/a.txt", "a", FileOptions::new())
        .await
        .unwrap();
    fixture
        .registry
        .add_file("42", "./b.txt", "b", FileOptions::new())
        .await
        .unwrap();
    fixture
        .registry
        .add_file("other", "c.txt", "c", FileOptions::new())
        .await
        .unwrap();

    let files: Vec<PathBuf> = fixture
        .registry
        .get_plugin_files("42")
        .into_iter()
        .collect();
    assert_eq!(
        files,
        vec![PathBuf::from("b.txt"), PathBuf::from("templates/a.txt")]
    );
    assert!(fixture.file_path("42", "templates/a.txt").exists());

    // "./b.txt" and "b.txt" name the same file
    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "b.txt")
        .unwrap();
    assert_eq!(&*cached, "b");
}

#[tokio::test]
async fn test_owners_do_not_share_files() {
    let fixture = TestFixture::new();

    fixture
        .registry
        .add_file("a", "same.txt", "from a", FileOptions::new())
        .await
        .unwrap();
    fixture
        .registry
        .add_file("b", "same.txt", "from b", FileOptions::new())
        .await
        .unwrap();

    let a = fixture.registry.get_cached_file_by_path("a", "same.txt").unwrap();
    let b = fixture.registry.get_cached_file_by_path("b", "same.txt").unwrap();
    assert_eq!(&*a, "from a");
    assert_eq!(&*b, "from b");
}

#[tokio::test]
async fn test_untracked_file_errors() {
    let fixture = TestFixture::new();

    let err = fixture
        .registry
        .get_cached_file_by_path("42", "missing.txt")
        .unwrap_err();
    assert!(matches!(err, Error::FileNotTracked { .. }));
    assert!(err.is_not_found());

    assert!(matches!(
        fixture.registry.write_file("42", "missing.txt", "x").await,
        Err(Error::FileNotTracked { .. })
    ));
    assert!(matches!(
        fixture.registry.reload_file("42", "missing.txt").await,
        Err(Error::FileNotTracked { .. })
    ));
}

#[tokio::test]
async fn test_invalid_paths_are_rejected() {
    let fixture = TestFixture::new();

    for path in ["../escape.txt", "a/../../b.txt", "/etc/passwd", ""] {
        let err = fixture
            .registry
            .add_file("42", path, "x", FileOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }), "path {path:?}");
    }

    assert!(fixture.registry.get_plugin_files("42").is_empty());
}

#[tokio::test]
async fn test_write_file_updates_disk_and_cache() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_file("42", "notes.txt", "v1", FileOptions::new())
        .await
        .unwrap();

    fixture
        .registry
        .write_file("42", "notes.txt", "v2")
        .await
        .unwrap();

    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "notes.txt")
        .unwrap();
    assert_eq!(&*cached, "v2");
    assert_eq!(
        std::fs::read_to_string(fixture.file_path("42", "notes.txt")).unwrap(),
        "v2"
    );
}

#[tokio::test]
async fn test_add_same_path_overwrites() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_file("42", "notes.txt", "first", FileOptions::new())
        .await
        .unwrap();
    fixture
        .registry
        .add_file("42", "notes.txt", "second", FileOptions::new())
        .await
        .unwrap();

    assert_eq!(fixture.registry.get_plugin_files("42").len(), 1);
    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "notes.txt")
        .unwrap();
    assert_eq!(&*cached, "second");
}

#[tokio::test]
async fn test_failed_re_add_keeps_previous_tracking() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_file("42", "sub/notes.txt", "v1", FileOptions::new())
        .await
        .unwrap();

    // A plain file where the parent directory should be
    let sub_dir = fixture.file_path("42", "sub");
    std::fs::remove_dir_all(&sub_dir).unwrap();
    write_raw(&sub_dir, "in the way");

    let result = fixture
        .registry
        .add_file("42", "sub/notes.txt", "v2", FileOptions::new().watch(true))
        .await;
    assert!(result.is_err());

    let files: Vec<PathBuf> = fixture
        .registry
        .get_plugin_files("42")
        .into_iter()
        .collect();
    assert_eq!(files, vec![PathBuf::from("sub/notes.txt")]);
    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "sub/notes.txt")
        .unwrap();
    assert_eq!(&*cached, "v1");
    assert!(fixture.registry.remove_file("42", "sub/notes.txt").await.unwrap());
}

#[tokio::test]
async fn test_reload_file_picks_up_external_edit() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_file("42", "notes.txt", "old", FileOptions::new())
        .await
        .unwrap();

    write_raw(&fixture.file_path("42", "notes.txt"), "new");

    // Without a watch the cache keeps the last known content
    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "notes.txt")
        .unwrap();
    assert_eq!(&*cached, "old");

    let reloaded = fixture
        .registry
        .reload_file("42", "notes.txt")
        .await
        .unwrap();
    assert_eq!(&*reloaded, "new");
    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "notes.txt")
        .unwrap();
    assert_eq!(&*cached, "new");
}

#[tokio::test]
async fn test_reload_deleted_file_keeps_cache() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_file("42", "notes.txt", "kept", FileOptions::new())
        .await
        .unwrap();

    std::fs::remove_file(fixture.file_path("42", "notes.txt")).unwrap();
    let err = fixture
        .registry
        .reload_file("42", "notes.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileRead { .. }));

    let cached = fixture
        .registry
        .get_cached_file_by_path("42", "notes.txt")
        .unwrap();
    assert_eq!(&*cached, "kept");
}

#[tokio::test]
async fn test_remove_file_untracks() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_file("42", "notes.txt", "bye", FileOptions::new())
        .await
        .unwrap();

    assert!(fixture.registry.remove_file("42", "notes.txt").await.unwrap());
    assert!(!fixture.registry.remove_file("42", "notes.txt").await.unwrap());

    assert!(fixture.registry.get_plugin_files("42").is_empty());
    assert!(matches!(
        fixture.registry.get_cached_file_by_path("42", "notes.txt"),
        Err(Error::FileNotTracked { .. })
    ));
    // Left on disk
    assert!(fixture.file_path("42", "notes.txt").exists());
}

#[tokio::test]
async fn test_files_and_config_share_owner_dir() {
    use common::TestConfig;
    use uniconf::ConfigOptions;

    let fixture = TestFixture::new();
    fixture
        .registry
        .add_config::<TestConfig>("42", ConfigOptions::new().init_now(true))
        .await
        .unwrap();
    fixture
        .registry
        .add_file("42", "extra.txt", "x", FileOptions::new())
        .await
        .unwrap();

    let owner_dir = fixture.config_dir().join("42");
    assert!(owner_dir.join("config.json").exists());
    assert!(owner_dir.join("files").join("extra.txt").exists());
}
