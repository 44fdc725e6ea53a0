//! Concurrency Tests
//!
//! Many tasks hammering the same and different owners. Every save must leave
//! a complete, parseable file and no operation may deadlock.

mod common;

use common::{
    OtherConfig, TestConfig, TestFixture, read_config_file, settle, write_external, write_raw,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uniconf::{ConfigOptions, FileOptions};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_and_reloads_same_owner() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_config::<TestConfig>("42", ConfigOptions::new().init_now(true))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..20u32 {
        let registry = fixture.registry.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let config = registry.get_config::<TestConfig>("42").unwrap();
                config.write().option2 = i;
                registry.save_config("42").await.unwrap();
            } else {
                registry.reload_config("42").await.unwrap();
            }
        }));
    }

    let all = tokio::time::timeout(Duration::from_secs(10), async {
        for task in tasks {
            task.await.unwrap();
        }
    })
    .await;
    assert!(all.is_ok(), "operations did not finish");

    // File is always a complete document
    let on_disk = read_config_file(&fixture.config_path("42"));
    assert_eq!(on_disk["option1"], "default_value");
    assert!(on_disk["option2"].is_u64());
    assert!(!fixture.config_path("42").with_extension("json.tmp").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_owners_progress_independently() {
    let fixture = TestFixture::new();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let registry = fixture.registry.clone();
        tasks.push(tokio::spawn(async move {
            let owner = format!("plugin_{i}");
            registry
                .add_file(&owner, "state.txt", format!("{i}"), FileOptions::new())
                .await
                .unwrap();
            for round in 0..5 {
                registry
                    .write_file(&owner, "state.txt", format!("{i}:{round}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for i in 0..8 {
        let owner = format!("plugin_{i}");
        let cached = fixture
            .registry
            .get_cached_file_by_path(&owner, "state.txt")
            .unwrap();
        assert_eq!(&*cached, format!("{i}:4"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_registrations_of_one_schema() {
    let fixture = TestFixture::new();

    let mut tasks = Vec::new();
    for i in 0..6 {
        let registry = fixture.registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .add_config::<OtherConfig>(&format!("owner_{i}"), ConfigOptions::new())
                .await
                .is_ok()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }

    // Exactly one owner can hold a schema
    assert_eq!(winners, 1);
    assert_eq!(fixture.registry.get_config_classes().len(), 1);
}

#[tokio::test]
async fn test_lock_released_after_failure() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_config::<TestConfig>("42", ConfigOptions::new().init_now(true))
        .await
        .unwrap();

    write_raw(&fixture.config_path("42"), "garbage");
    assert!(fixture.registry.reload_config("42").await.is_err());

    // A failed reload must not leave the owner locked
    let save = tokio::time::timeout(
        Duration::from_secs(5),
        fixture.registry.save_config("42"),
    )
    .await;
    assert!(matches!(save, Ok(Ok(()))));
    assert!(fixture.registry.reload_config("42").await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_held_write_guard_does_not_stall_registry() {
    let fixture = TestFixture::new();
    fixture
        .registry
        .add_config::<TestConfig>("42", ConfigOptions::new().init_now(true))
        .await
        .unwrap();
    let handle = fixture.registry.get_config::<TestConfig>("42").unwrap();

    let (held_tx, held_rx) = tokio::sync::oneshot::channel();
    let holder = {
        let registry = fixture.registry.clone();
        std::thread::spawn(move || {
            let mut guard = handle.write();
            guard.option2 = 7;
            held_tx.send(()).unwrap();

            // Lets the save below block on this guard
            std::thread::sleep(Duration::from_millis(200));
            let registered = registry.has_config_class("42");
            drop(guard);
            registered
        })
    };
    held_rx.await.unwrap();

    let save = {
        let registry = fixture.registry.clone();
        tokio::spawn(async move { registry.save_config("42").await })
    };
    let register = {
        let registry = fixture.registry.clone();
        tokio::spawn(async move {
            registry
                .add_config::<OtherConfig>("other", ConfigOptions::new())
                .await
        })
    };

    let holder = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || holder.join().unwrap()),
    )
    .await;
    assert!(
        matches!(holder, Ok(Ok(true))),
        "lookup stalled behind a pending save"
    );

    let (saved, registered) = tokio::time::timeout(Duration::from_secs(5), async {
        (save.await.unwrap(), register.await.unwrap())
    })
    .await
    .expect("save or registration stalled");
    assert!(saved.is_ok());
    assert!(registered.is_ok());

    let file = read_config_file(&fixture.config_path("42"));
    assert_eq!(file["option2"], 7);
    assert!(fixture.registry.has_config_class("other"));
}

/// A value written as one document: both fields come from the same writer
fn is_whole(config: &TestConfig) -> bool {
    if config.option1 == "default_value" {
        return config.option2 == 42;
    }
    ["saved_", "external_"].iter().any(|prefix| {
        config.option1.strip_prefix(prefix) == Some(config.option2.to_string().as_str())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saves_race_external_edits_on_watched_owner() {
    let fixture = TestFixture::with_debounce(Duration::from_millis(20));
    let failures = Arc::new(Mutex::new(Vec::new()));
    {
        let failures = Arc::clone(&failures);
        fixture.registry.events().on_failure(move |owner, error| {
            failures
                .lock()
                .unwrap()
                .push(format!("{owner}: {error}"));
        });
    }

    fixture
        .registry
        .add_config::<TestConfig>("42", ConfigOptions::new().init_now(true).watch(true))
        .await
        .unwrap();
    settle().await;

    let writer = {
        let path = fixture.config_path("42");
        tokio::task::spawn_blocking(move || {
            for i in 0..30u32 {
                write_external(
                    &path,
                    &format!(r#"{{"option1": "external_{i}", "option2": {i}, "enabled": true}}"#),
                );
                std::thread::sleep(Duration::from_millis(15));
            }
        })
    };
    let saver = {
        let registry = fixture.registry.clone();
        tokio::spawn(async move {
            for i in 0..30u32 {
                let config = registry.get_config::<TestConfig>("42").unwrap();
                config.update(|c| {
                    c.option1 = format!("saved_{i}");
                    c.option2 = i;
                });
                registry.save_config("42").await.unwrap();

                let live = registry.get_config::<TestConfig>("42").unwrap().snapshot();
                assert!(is_whole(&live), "torn live value: {live:?}");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    };

    tokio::time::timeout(Duration::from_secs(15), async {
        writer.await.unwrap();
        saver.await.unwrap();
    })
    .await
    .expect("writers stalled");
    settle().await;

    let file = read_config_file(&fixture.config_path("42"));
    let on_disk: TestConfig = serde_json::from_value(file).unwrap();
    assert!(is_whole(&on_disk), "torn file: {on_disk:?}");

    let live = fixture
        .registry
        .get_config::<TestConfig>("42")
        .unwrap()
        .snapshot();
    assert!(is_whole(&live), "torn live value: {live:?}");
    assert!(failures.lock().unwrap().is_empty(), "{:?}", failures.lock().unwrap());

    // The owner lock is free once the dust settles
    let save = tokio::time::timeout(
        Duration::from_secs(5),
        fixture.registry.save_config("42"),
    )
    .await;
    assert!(matches!(save, Ok(Ok(()))));
}
