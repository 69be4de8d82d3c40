// ABOUTME: Integration tests for the file and in-memory state stores.
// ABOUTME: Covers persistence layout, record ordering, scope listing, and scope locks.

mod support;

use chrono::Utc;
use kiln::diagnostics::WarningKind;
use kiln::engine::{Engine, Phase, RunOptions, RunPhase, Scope};
use kiln::state::{
    FileStateStore, LockInfo, MemoryStateStore, StateRecord, StateStore, StoreError,
    StoreErrorKind,
};
use kiln::types::{ResourceId, ResourceType};
use std::time::Duration;
use support::{Fake, FakeProps, Journal, init_tracing, scope};
use tempfile::TempDir;

fn record(id: &str, sequence: u64) -> StateRecord {
    StateRecord {
        id: ResourceId::new(id).unwrap(),
        resource_type: ResourceType::new("test::Fake").unwrap(),
        properties: serde_json::json!({ "value": id }),
        output: serde_json::json!({ "value": id, "generation": 1 }),
        phase: Phase::Create,
        sequence,
        updated_at: Utc::now(),
    }
}

fn file_store() -> (TempDir, FileStateStore) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path().join("state"));
    (dir, store)
}

async fn ids(store: &dyn StateStore, scope_name: &str) -> Vec<String> {
    store
        .load(&scope(scope_name))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id.to_string())
        .collect()
}

mod file {
    use super::*;

    #[tokio::test]
    async fn missing_scope_loads_empty() {
        let (_dir, store) = file_store();
        assert!(store.load(&scope("app-dev")).await.unwrap().is_empty());
        assert!(store.list_scopes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_load_in_sequence_order() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        store.put(&s, record("late", 5)).await.unwrap();
        store.put(&s, record("early", 1)).await.unwrap();
        store.put(&s, record("middle", 3)).await.unwrap();

        assert_eq!(ids(&store, "app-dev").await, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn put_replaces_existing_record() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        store.put(&s, record("net", 0)).await.unwrap();
        let mut updated = record("net", 4);
        updated.phase = Phase::Update;
        store.put(&s, updated).await.unwrap();

        let records = store.load(&s).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].phase, Phase::Update);
        assert_eq!(records[0].sequence, 4);
    }

    #[tokio::test]
    async fn document_is_written_atomically_as_json() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        store.put(&s, record("net", 0)).await.unwrap();

        let path = store.scope_path(&s);
        let document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(document["version"], 1);
        assert_eq!(document["scope"], "app-dev");
        assert_eq!(document["records"][0]["id"], "net");
        assert_eq!(document["records"][0]["phase"], "create");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn removing_last_record_deletes_document() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        store.put(&s, record("net", 0)).await.unwrap();
        let removed = store.remove(&s, &ResourceId::new("net").unwrap()).await.unwrap();

        assert_eq!(removed.map(|r| r.id.to_string()), Some("net".to_string()));
        assert!(!store.scope_path(&s).exists());
        assert!(
            store
                .remove(&s, &ResourceId::new("net").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_scopes_ignores_locks_and_temp_files() {
        let (_dir, store) = file_store();

        store.put(&scope("shop-prod"), record("a", 0)).await.unwrap();
        store.put(&scope("shop-dev"), record("a", 0)).await.unwrap();
        let _lock = store.lock(&scope("shop-qa"), false).await.unwrap();
        std::fs::write(store.dir().join("junk.json.tmp"), b"{}").unwrap();

        let scopes: Vec<_> = store
            .list_scopes()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(scopes, vec!["shop-dev", "shop-prod"]);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_format_error() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.scope_path(&s), b"{ not json").unwrap();

        let err = store.load(&s).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Format);
        assert!(err.to_string().contains("app-dev.json"));
    }

    #[tokio::test]
    async fn state_survives_a_new_engine() {
        let (dir, store) = file_store();
        let journal = Journal::new();
        let s = scope("app-dev");

        let engine = Engine::new(store);
        let fake = engine.define("test::Fake", Fake::new(&journal)).unwrap();
        engine
            .run(&s, RunPhase::Up, RunOptions::default(), async |scope: &Scope| {
                fake.apply(scope, "net", FakeProps::new("a")).await?;
                Ok(())
            })
            .await
            .unwrap();

        let engine = Engine::new(FileStateStore::new(dir.path().join("state")));
        let fake = engine.define("test::Fake", Fake::new(&journal)).unwrap();
        let scope = engine.scope(&s, RunPhase::Up).await.unwrap();
        fake.apply(&scope, "net", FakeProps::new("a")).await.unwrap();

        assert_eq!(journal.calls()[1].phase, Phase::Update);
    }
}

mod memory {
    use super::*;

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = MemoryStateStore::new();

        store.put(&scope("a"), record("net", 0)).await.unwrap();
        store.put(&scope("b"), record("db", 0)).await.unwrap();

        assert_eq!(ids(&store, "a").await, vec!["net"]);
        assert_eq!(ids(&store, "b").await, vec!["db"]);
        assert_eq!(store.len(&scope("a")), 1);
    }

    #[tokio::test]
    async fn empty_scope_disappears_from_listing() {
        let store = MemoryStateStore::new();
        let s = scope("a");

        store.put(&s, record("net", 0)).await.unwrap();
        store.remove(&s, &ResourceId::new("net").unwrap()).await.unwrap();

        assert!(store.is_empty(&s));
        assert!(store.list_scopes().await.unwrap().is_empty());
    }
}

mod locks {
    use super::*;

    #[tokio::test]
    async fn second_lock_is_refused_until_release() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        let lock = store.lock(&s, false).await.unwrap();
        assert!(LockInfo::lock_path(store.dir(), &s).exists());

        let err = store.lock(&s, false).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Locked);
        assert!(matches!(err, StoreError::LockHeld { .. }));

        lock.release();
        assert!(!LockInfo::lock_path(store.dir(), &s).exists());
        assert!(store.lock(&s, false).await.is_ok());
    }

    #[tokio::test]
    async fn dropping_the_lock_releases_it() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        {
            let _lock = store.lock(&s, false).await.unwrap();
        }
        assert!(store.lock(&s, false).await.is_ok());
    }

    #[tokio::test]
    async fn force_breaks_a_held_lock() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        let first = store.lock(&s, false).await.unwrap();
        let second = store.lock(&s, true).await.unwrap();

        let broken = second.broken().unwrap();
        assert_eq!(broken.pid, std::process::id());
        std::mem::forget(first);
    }

    #[tokio::test]
    async fn stale_lock_is_broken_automatically() {
        let (_dir, store) = file_store();
        let store = store.with_stale_after(Duration::from_secs(60));
        let s = scope("app-dev");

        let mut info = LockInfo::new(&s);
        info.holder = "ci-runner".to_string();
        info.started_at = Utc::now() - chrono::Duration::minutes(5);
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(
            LockInfo::lock_path(store.dir(), &s),
            serde_json::to_vec(&info).unwrap(),
        )
        .unwrap();

        let lock = store.lock(&s, false).await.unwrap();
        assert_eq!(lock.broken().map(|b| b.holder.as_str()), Some("ci-runner"));
    }

    #[tokio::test]
    async fn unreadable_lock_is_broken() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");

        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(LockInfo::lock_path(store.dir(), &s), b"garbage").unwrap();

        let lock = store.lock(&s, false).await.unwrap();
        assert!(lock.broken().is_none());
    }

    #[tokio::test]
    async fn run_refuses_a_locked_scope() {
        let (_dir, store) = file_store();
        let s = scope("app-dev");
        let _held = store.lock(&s, false).await.unwrap();

        let engine = Engine::new(FileStateStore::new(store.dir()));
        let err = engine.destroy(&s).await.unwrap_err();
        assert_eq!(err.kind(), kiln::engine::ReconcileErrorKind::Store);
    }

    #[tokio::test]
    async fn forced_run_reports_broken_lock() {
        let store = std::sync::Arc::new(MemoryStateStore::new());
        let s = scope("app-dev");
        let _held = store.lock(&s, false).await.unwrap();

        let engine = Engine::with_store(store.clone());
        let options = RunOptions {
            force_lock: true,
            ..RunOptions::default()
        };
        let report = engine
            .run(&s, RunPhase::Up, options, async |_: &Scope| Ok(()))
            .await
            .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::LockBroken);
    }
}
