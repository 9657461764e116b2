mod common;

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use audiencesync::{
    batch::{LOG_FORMAT_VERSION, LogEnvelope, UpdateBatch},
    core::log::MutationLog,
    edit::{AttributeEdit, SubscriptionListEdit, TagGroupEdit},
    persist::{KeyValueStore, memory::MemoryStore},
};

use common::{BrokenStore, LOG_KEY};

fn tag(group: &str, tag: &str) -> UpdateBatch {
    UpdateBatch::tag_groups(vec![TagGroupEdit::add(group, tag)])
}

#[test]
fn concurrent_appends_are_all_kept() {
    let store = Arc::new(MemoryStore::new());
    let log = Arc::new(MutationLog::open(store.clone(), LOG_KEY));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..25 {
                    log.append(tag("team", &format!("w{worker}-{i}")));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    assert_eq!(log.len(), 200);
    let reopened = MutationLog::open(store, LOG_KEY);
    assert_eq!(reopened.read_all(), log.read_all());
}

#[test]
fn drains_racing_appends_lose_nothing() {
    let log = Arc::new(MutationLog::open(Arc::new(MemoryStore::new()), LOG_KEY));
    let stop = Arc::new(AtomicBool::new(false));

    let drainer = {
        let log = Arc::clone(&log);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut sent = Vec::new();
            while !stop.load(Ordering::Acquire) {
                if let Some(batch) = log.drain() {
                    assert!(log.pop_submitted(&batch), "only the drainer pops");
                    sent.extend(batch.tag_groups.into_iter().map(|e| e.tag));
                }
            }
            sent
        })
    };

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..100 {
                    log.append(tag("team", &format!("w{worker}-{i}")));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }
    stop.store(true, Ordering::Release);
    let mut seen = drainer.join().expect("drainer");

    seen.extend(log.pending_tag_group_edits().into_iter().map(|e| e.tag));
    let unique: BTreeSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), seen.len(), "no edit delivered twice");
    assert_eq!(seen.len(), 400, "every edit drained or still queued");
}

#[test]
fn appends_keep_order_and_skip_empty_batches() {
    let log = MutationLog::open(Arc::new(MemoryStore::new()), LOG_KEY);
    log.append(tag("team", "red"));
    log.append(UpdateBatch::default());
    log.append(tag("team", "blue"));

    assert_eq!(log.read_all(), vec![tag("team", "red"), tag("team", "blue")]);
}

#[test]
fn replace_pop_and_clear() {
    let store = Arc::new(MemoryStore::new());
    let log = MutationLog::open(store.clone(), LOG_KEY);

    log.replace(vec![tag("a", "1"), tag("b", "2")]);
    assert_eq!(log.pop_first(), Some(tag("a", "1")));
    assert_eq!(log.read_all(), vec![tag("b", "2")]);

    log.clear();
    assert!(log.is_empty());
    assert_eq!(log.pop_first(), None);
    assert!(!store.contains(LOG_KEY));
}

#[test]
fn drain_stores_single_collapsed_batch() {
    let store = Arc::new(MemoryStore::new());
    let log = MutationLog::open(store.clone(), LOG_KEY);
    log.append(UpdateBatch::attributes(vec![AttributeEdit::set("level", 1)]));
    log.append(UpdateBatch::attributes(vec![AttributeEdit::set("level", 2)]));
    log.append(tag("team", "red"));

    let drained = log.drain().expect("net change");

    assert_eq!(drained.attributes, vec![AttributeEdit::set("level", 2)]);
    assert_eq!(drained.tag_groups, vec![TagGroupEdit::add("team", "red")]);
    assert_eq!(log.read_all(), vec![drained.clone()]);
    assert_eq!(MutationLog::open(store, LOG_KEY).read_all(), vec![drained]);
}

#[test]
fn drain_of_cancelled_edits_clears_log() {
    let log = MutationLog::open(Arc::new(MemoryStore::new()), LOG_KEY);
    log.append(UpdateBatch::subscription_lists(vec![
        SubscriptionListEdit::subscribe("news"),
    ]));
    log.append(UpdateBatch::subscription_lists(vec![
        SubscriptionListEdit::unsubscribe("news"),
    ]));

    assert_eq!(log.drain(), None);
    assert!(log.is_empty());
    assert_eq!(log.drain(), None);
}

#[test]
fn pending_views_reflect_queue() {
    let log = MutationLog::open(Arc::new(MemoryStore::new()), LOG_KEY);
    log.append(UpdateBatch {
        subscription_lists: vec![SubscriptionListEdit::subscribe("news")],
        tag_groups: vec![TagGroupEdit::add("team", "red")],
        attributes: vec![AttributeEdit::set("level", 1)],
    });
    log.append(UpdateBatch {
        subscription_lists: vec![SubscriptionListEdit::unsubscribe("sports")],
        tag_groups: vec![TagGroupEdit::remove("team", "red")],
        attributes: vec![AttributeEdit::remove("level")],
    });

    assert_eq!(
        log.pending_tag_group_edits(),
        vec![TagGroupEdit::add("team", "red"), TagGroupEdit::remove("team", "red")]
    );
    assert_eq!(
        log.pending_attribute_edits(),
        vec![AttributeEdit::set("level", 1), AttributeEdit::remove("level")]
    );
    assert_eq!(
        log.pending_subscription_list_edits(),
        vec![
            SubscriptionListEdit::subscribe("news"),
            SubscriptionListEdit::unsubscribe("sports"),
        ]
    );
    assert_eq!(log.len(), 2, "views do not mutate the log");
}

#[test]
fn store_failures_keep_in_memory_state() {
    let log = MutationLog::open(Arc::new(BrokenStore), LOG_KEY);
    log.append(tag("team", "red"));
    log.append(tag("team", "blue"));

    assert_eq!(log.len(), 2);
    assert!(log.drain().is_some());
    assert_eq!(log.len(), 1);
    log.clear();
    assert!(log.is_empty());
}

#[test]
fn payload_is_versioned_envelope() {
    let store = Arc::new(MemoryStore::new());
    let log = MutationLog::open(store.clone(), LOG_KEY);
    log.append(tag("team", "red"));

    let bytes = store.get_bytes(LOG_KEY).expect("get").expect("stored");
    let envelope: LogEnvelope = serde_json::from_slice(&bytes).expect("envelope");
    assert_eq!(envelope.format_version, LOG_FORMAT_VERSION);
    assert_eq!(envelope.batches, vec![tag("team", "red")]);
}

#[test]
fn bare_batch_list_payload_still_loads() {
    let store = Arc::new(MemoryStore::new());
    let legacy = serde_json::to_vec(&vec![tag("team", "red")]).expect("encode");
    store.set_bytes(LOG_KEY, &legacy).expect("set");

    let log = MutationLog::open(store, LOG_KEY);
    assert_eq!(log.read_all(), vec![tag("team", "red")]);
}

#[test]
fn unreadable_payloads_start_empty() {
    let store = Arc::new(MemoryStore::new());
    let future = serde_json::json!({ "format_version": 99, "batches": [] });
    store
        .set_bytes(LOG_KEY, future.to_string().as_bytes())
        .expect("set");
    assert!(MutationLog::open(store.clone(), LOG_KEY).is_empty());

    store.set_bytes(LOG_KEY, b"not json").expect("set");
    let log = MutationLog::open(store, LOG_KEY);
    assert!(log.is_empty());
    log.append(tag("team", "red"));
    assert_eq!(log.len(), 1);
}

#[test]
fn logs_under_different_keys_are_independent() {
    let store = Arc::new(MemoryStore::new());
    let first = MutationLog::open(store.clone(), "first");
    let second = MutationLog::open(store.clone(), "second");
    first.append(tag("team", "red"));

    assert!(second.is_empty());
    assert!(MutationLog::open(store, "second").is_empty());
}
