use std::sync::Arc;

use audiencesync::{
    batch::UpdateBatch,
    core::log::MutationLog,
    edit::{AttributeEdit, SubscriptionListEdit},
    persist::{KeyValueStore, sqlite::SqliteStore},
};

#[test]
fn pending_log_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("audience.db");

    let queued = vec![
        UpdateBatch::subscription_lists(vec![SubscriptionListEdit::subscribe("news")]),
        UpdateBatch::attributes(vec![AttributeEdit::set("name", "Ada")]),
    ];
    {
        let store = Arc::new(SqliteStore::open(&db_path).expect("open"));
        let log = MutationLog::open(store, "audience.pending_updates");
        for batch in &queued {
            log.append(batch.clone());
        }
    }

    let store = Arc::new(SqliteStore::open(&db_path).expect("reopen"));
    let log = MutationLog::open(store.clone(), "audience.pending_updates");
    assert_eq!(log.read_all(), queued);

    log.clear();
    assert!(store.is_empty().expect("count"));
}

#[test]
fn set_overwrites_and_remove_deletes() {
    let store = SqliteStore::open_in_memory().expect("open");
    assert_eq!(store.get_bytes("k").expect("get"), None);

    store.set_bytes("k", b"one").expect("set");
    store.set_bytes("k", b"two").expect("overwrite");
    store.set_bytes("other", b"x").expect("set other");

    assert_eq!(store.get_bytes("k").expect("get"), Some(b"two".to_vec()));
    assert_eq!(store.len().expect("len"), 2);

    store.remove("k").expect("remove");
    store.remove("missing").expect("remove missing");
    assert_eq!(store.get_bytes("k").expect("get"), None);
    assert_eq!(store.len().expect("len"), 1);
}
