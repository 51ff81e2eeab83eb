// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(clippy::missing_panics_doc, reason = "Tests")]
#![allow(clippy::missing_errors_doc, reason = "Tests")]
#![allow(missing_docs, reason = "Tests")]
#![allow(clippy::assertions_on_result_states, reason = "Tests use assert!(x.is_err()) for clarity")]

use iofs::{AtomicWriteOptions, Durability, Error, Executor, ExecutorConfig, Path, ReadDirOptions, Root, ThreadModel, WalkOptions};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

async fn setup() -> (TempDir, iofs::Directory) {
    let tmp = TempDir::new().unwrap();
    let executor = Executor::new(ExecutorConfig::new());
    let dir = Root::bind(tmp.path(), executor).await.unwrap();
    (tmp, dir)
}

fn path(raw: &str) -> Path {
    Path::new(raw).unwrap()
}

// ===========================================================================
// Root
// ===========================================================================

mod root {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn bind_to_valid_directory_succeeds() {
        let tmp = TempDir::new().unwrap();
        let executor = Executor::new(ExecutorConfig::new());
        let _dir = Root::bind(tmp.path(), executor).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bind_to_non_existent_path_fails() {
        let tmp = TempDir::new().unwrap();
        let executor = Executor::new(ExecutorConfig::new());
        let result = Root::bind(tmp.path().join("does-not-exist"), executor).await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bind_to_file_fails() {
        let tmp = TempDir::new().unwrap();
        let file_path = tmp.path().join("a_file.txt");
        std::fs::write(&file_path, b"hello").unwrap();
        let executor = Executor::new(ExecutorConfig::new());
        let result = Root::bind(file_path, executor).await;
        assert!(matches!(result, Err(Error::NotDirectory)));
    }
}

// ===========================================================================
// Directory
// ===========================================================================

mod directory {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn create_dir_and_exists() {
        let (_tmp, dir) = setup().await;
        dir.create_dir(&path("sub")).await.unwrap();
        assert!(dir.exists(&path("sub")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_dir_all_nested() {
        let (_tmp, dir) = setup().await;
        dir.create_dir_all(&path("a/b/c")).await.unwrap();
        assert!(dir.exists(&path("a/b/c")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_and_write_round_trip() {
        let (_tmp, dir) = setup().await;
        dir.write(&path("file.bin"), b"hello bytes".to_vec()).await.unwrap();
        let data = dir.read(&path("file.bin")).await.unwrap();
        assert_eq!(data, b"hello bytes");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_across_two_narrowed_capabilities() {
        let (_tmp, dir) = setup().await;
        dir.create_dir(&path("a")).await.unwrap();
        dir.create_dir(&path("b")).await.unwrap();
        dir.write(&path("a/file.txt"), b"payload".to_vec()).await.unwrap();

        let a = dir.open_dir(&path("a")).await.unwrap();
        let b = dir.open_dir(&path("b")).await.unwrap();
        a.rename(&path("file.txt"), &b, &path("file.txt")).await.unwrap();

        assert!(!a.exists(&path("file.txt")).await.unwrap());
        assert!(b.exists(&path("file.txt")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_dir_all_clears_a_populated_tree() {
        let (_tmp, dir) = setup().await;
        dir.create_dir_all(&path("a/b")).await.unwrap();
        dir.write(&path("a/b/leaf.txt"), b"x".to_vec()).await.unwrap();
        dir.remove_dir_all(&path("a")).await.unwrap();
        assert!(!dir.exists(&path("a")).await.unwrap());
    }
}

// ===========================================================================
// Atomic write
// ===========================================================================

mod atomic_write_protocol {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn full_durability_write_is_visible_and_leaves_no_temp_file() {
        let (tmp, dir) = setup().await;
        dir.write_atomic(&path("config.toml"), b"a = 1\n".to_vec(), AtomicWriteOptions::new().durability(Durability::Full))
            .await
            .unwrap();

        assert_eq!(dir.read(&path("config.toml")).await.unwrap(), b"a = 1\n");
        let leftover = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "config.toml")
            .count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exclusive_write_rejects_an_existing_target_and_leaves_it_untouched() {
        let (_tmp, dir) = setup().await;
        dir.write(&path("config.toml"), b"old".to_vec()).await.unwrap();

        let result = dir
            .write_atomic(&path("config.toml"), b"new".to_vec(), AtomicWriteOptions::new().exclusive(true))
            .await;

        assert!(matches!(result, Err(Error::AlreadyExists)));
        assert_eq!(dir.read(&path("config.toml")).await.unwrap(), b"old");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn data_only_durability_still_renames_into_place() {
        let (_tmp, dir) = setup().await;
        dir.write_atomic(&path("a.txt"), b"data".to_vec(), AtomicWriteOptions::new().durability(Durability::DataOnly))
            .await
            .unwrap();
        assert_eq!(dir.read(&path("a.txt")).await.unwrap(), b"data");
    }
}

// ===========================================================================
// Copy engine
// ===========================================================================

mod copy_engine {
    use super::*;
    use iofs::CopyOptions;

    #[tokio::test(flavor = "multi_thread")]
    async fn copies_file_contents() {
        let (_tmp, dir) = setup().await;
        dir.write(&path("src.bin"), vec![7_u8; 65_536]).await.unwrap();
        dir.copy(&path("src.bin"), &dir, &path("dst.bin"), CopyOptions::new()).await.unwrap();
        assert_eq!(dir.read(&path("dst.bin")).await.unwrap(), vec![7_u8; 65_536]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refuses_to_overwrite_by_default() {
        let (_tmp, dir) = setup().await;
        dir.write(&path("src.bin"), b"src".to_vec()).await.unwrap();
        dir.write(&path("dst.bin"), b"dst".to_vec()).await.unwrap();

        let result = dir.copy(&path("src.bin"), &dir, &path("dst.bin"), CopyOptions::new()).await;
        assert!(matches!(result, Err(Error::AlreadyExists)));
        assert_eq!(dir.read(&path("dst.bin")).await.unwrap(), b"dst");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overwrite_true_replaces_the_destination() {
        let (_tmp, dir) = setup().await;
        dir.write(&path("src.bin"), b"new-contents".to_vec()).await.unwrap();
        dir.write(&path("dst.bin"), b"old-contents".to_vec()).await.unwrap();

        dir.copy(&path("src.bin"), &dir, &path("dst.bin"), CopyOptions::new().overwrite(true))
            .await
            .unwrap();
        assert_eq!(dir.read(&path("dst.bin")).await.unwrap(), b"new-contents");
    }
}

// ===========================================================================
// Directory iteration — batching, 1000-entry directories, cancellation
// ===========================================================================

mod directory_iteration {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn batched_read_dir_visits_every_entry_of_a_large_directory_exactly_once() {
        let (_tmp, dir) = setup().await;
        dir.create_dir(&path("many")).await.unwrap();
        let many = dir.open_dir(&path("many")).await.unwrap();
        for i in 0..1000 {
            many.write(&path(&format!("f-{i:04}.txt")), b"x".to_vec()).await.unwrap();
        }

        let mut read_dir = dir.read_dir(&path("many"), ReadDirOptions::new().batch_size(64)).await.unwrap();
        let mut seen = std::collections::HashSet::new();
        while let Some(entry) = read_dir.next().await.unwrap() {
            let inserted = seen.insert(entry.file_name().to_string_lossy().into_owned());
            assert!(inserted, "every entry must be delivered exactly once");
        }
        assert_eq!(seen.len(), 1000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn terminating_mid_iteration_stops_delivery_without_hanging() {
        let (_tmp, dir) = setup().await;
        dir.create_dir(&path("many")).await.unwrap();
        let many = dir.open_dir(&path("many")).await.unwrap();
        for i in 0..200 {
            many.write(&path(&format!("f-{i:04}.txt")), b"x".to_vec()).await.unwrap();
        }

        let mut read_dir = dir.read_dir(&path("many"), ReadDirOptions::new().batch_size(8)).await.unwrap();
        let _first = read_dir.next().await.unwrap();
        read_dir.terminate();
        assert!(read_dir.next().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn walk_visits_nested_directories_and_respects_max_depth() {
        let (_tmp, dir) = setup().await;
        dir.create_dir_all(&path("a/b/c")).await.unwrap();
        dir.write(&path("a/one.txt"), b"1".to_vec()).await.unwrap();
        dir.write(&path("a/b/two.txt"), b"2".to_vec()).await.unwrap();
        dir.write(&path("a/b/c/three.txt"), b"3".to_vec()).await.unwrap();

        let mut walk = dir.walk(&path("."), WalkOptions::new()).await.unwrap();
        let mut paths = Vec::new();
        while let Some(p) = walk.next().await.unwrap() {
            paths.push(p);
        }
        assert!(paths.iter().any(|p| p.ends_with("three.txt")));

        let mut shallow = dir.walk(&path("."), WalkOptions::new().max_depth(Some(1))).await.unwrap();
        let mut shallow_paths = Vec::new();
        while let Some(p) = shallow.next().await.unwrap() {
            shallow_paths.push(p);
        }
        assert!(!shallow_paths.iter().any(|p| p.ends_with("two.txt")));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn walk_with_symlink_cycle_terminates() {
        let (tmp, dir) = setup().await;
        dir.create_dir(&path("sub")).await.unwrap();
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("sub/loop")).unwrap();

        let mut walk = dir.walk(&path("."), WalkOptions::new().follow_symlinks(true)).await.unwrap();
        let mut count = 0;
        while walk.next().await.unwrap().is_some() {
            count += 1;
            assert!(count < 10_000, "walk did not terminate against a symlink cycle");
        }
    }
}

// ===========================================================================
// Executor lifecycle — shutdown and handle scoping
// ===========================================================================

mod executor_lifecycle {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_waits_for_in_flight_work_then_rejects_new_submissions() {
        let executor = Executor::new(ExecutorConfig::new());
        let handle = tokio::spawn({
            let executor = executor.clone();
            async move { executor.run(|| Ok(42_i32)).await }
        });
        let result = handle.await.unwrap();
        assert_eq!(result.unwrap(), 42);

        executor.shutdown().await;
        let after = executor.run(|| Ok(1_i32)).await;
        assert!(matches!(after, Err(Error::Shutdown)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn draining_fails_queued_jobs_but_lets_in_flight_work_finish() {
        let executor = Executor::new(ExecutorConfig::new().thread_model(ThreadModel::Dedicated { workers: 1 }));

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();

        // Occupies the dispatcher's sole worker thread until told to release,
        // so the second job below is admitted but never starts running.
        let in_flight = tokio::spawn({
            let executor = executor.clone();
            async move {
                executor
                    .run(move || {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok::<_, Error>(1_i32)
                    })
                    .await
            }
        });
        started_rx.recv().unwrap();

        let queued = tokio::spawn({
            let executor = executor.clone();
            async move { executor.run(|| Ok::<_, Error>(2_i32)).await }
        });

        // Give `queued` a chance to be admitted (pass the semaphore) before
        // draining begins, so it is genuinely pending-but-unstarted rather
        // than rejected outright by `check_running`.
        tokio::task::yield_now().await;
        let shutdown = tokio::spawn({
            let executor = executor.clone();
            async move { executor.shutdown().await }
        });

        release_tx.send(()).unwrap();

        assert_eq!(in_flight.await.unwrap().unwrap(), 1);
        assert!(matches!(queued.await.unwrap(), Err(Error::Shutdown)));
        shutdown.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_is_idempotent() {
        let executor = Executor::new(ExecutorConfig::new());
        executor.shutdown().await;
        executor.shutdown().await;
        assert!(matches!(executor.run(|| Ok(())).await, Err(Error::Shutdown)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dedicated_thread_model_also_services_jobs() {
        let executor = Executor::new(ExecutorConfig::new().thread_model(ThreadModel::Dedicated { workers: 2 }));
        let result = executor.run(|| Ok::<_, Error>(7_i32)).await.unwrap();
        assert_eq!(result, 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_closes_handles_still_in_the_registry() {
        let tmp = TempDir::new().unwrap();
        let executor = Executor::new(ExecutorConfig::new());
        let dir = Root::bind(tmp.path(), executor.clone()).await.unwrap();
        dir.write(&path("a.txt"), b"x".to_vec()).await.unwrap();

        let handle = dir.open(&path("a.txt"), iofs::OpenOptions::new().read(true)).await.unwrap();
        let id = executor.register_handle(handle).unwrap();

        executor.shutdown().await;

        let after = executor.with_handle(id, |h| h.read(1)).await;
        assert!(matches!(after, Err(Error::Shutdown)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn destroyed_handle_cannot_be_addressed_again() {
        let tmp = TempDir::new().unwrap();
        let executor = Executor::new(ExecutorConfig::new());
        let dir = Root::bind(tmp.path(), executor.clone()).await.unwrap();
        dir.write(&path("a.txt"), b"x".to_vec()).await.unwrap();

        let handle = dir.open(&path("a.txt"), iofs::OpenOptions::new().read(true)).await.unwrap();
        let id = executor.register_handle(handle).unwrap();
        executor.destroy_handle(id).await.unwrap();

        let result = executor.with_handle(id, |h| h.read(1)).await;
        assert!(matches!(result, Err(Error::InvalidHandle)));
    }
}
