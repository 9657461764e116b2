#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use audiencesync::{
    api::{ApiError, SubscriptionListClient, SubscriptionListFetchResponse, UpdateClient, UpdateResponse},
    batch::UpdateBatch,
    consent::PrivacyManager,
    core::{cache::CachedValue, log::MutationLog},
    engine::sync::SyncEngine,
    identity::Identity,
    persist::{memory::MemoryStore, KeyValueStore, PersistError, PersistResult},
    runtime::task::{TaskHandler, TaskRequestOptions, TaskScheduler},
    types::{ListId, ManualClock},
};

pub const TASK_ID: &str = "audience.update";
pub const LOG_KEY: &str = "audience.pending_updates";

/// Scripted API double: update statuses pop from a queue, defaulting to 200.
#[derive(Default)]
pub struct FakeApi {
    update_results: Mutex<VecDeque<Result<u16, ApiError>>>,
    submitted: Mutex<Vec<(String, UpdateBatch)>>,
    list_response: Mutex<Option<Result<SubscriptionListFetchResponse, ApiError>>>,
    fetches: AtomicUsize,
    hang_updates: AtomicBool,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_update_status(&self, status: u16) {
        self.update_results.lock().expect("lock").push_back(Ok(status));
    }

    pub fn push_update_error(&self, err: ApiError) {
        self.update_results.lock().expect("lock").push_back(Err(err));
    }

    pub fn hang_updates(&self, hang: bool) {
        self.hang_updates.store(hang, Ordering::SeqCst);
    }

    pub fn set_lists(&self, response: Result<SubscriptionListFetchResponse, ApiError>) {
        *self.list_response.lock().expect("lock") = Some(response);
    }

    pub fn submitted(&self) -> Vec<(String, UpdateBatch)> {
        self.submitted.lock().expect("lock").clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateClient for FakeApi {
    async fn update(&self, channel_id: &str, batch: &UpdateBatch) -> Result<UpdateResponse, ApiError> {
        self.submitted
            .lock()
            .expect("lock")
            .push((channel_id.to_string(), batch.clone()));
        if self.hang_updates.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.update_results.lock().expect("lock").pop_front();
        next.unwrap_or(Ok(200)).map(UpdateResponse::new)
    }
}

#[async_trait]
impl SubscriptionListClient for FakeApi {
    async fn get(&self, _channel_id: &str) -> Result<SubscriptionListFetchResponse, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.list_response
            .lock()
            .expect("lock")
            .clone()
            .unwrap_or_else(|| Ok(SubscriptionListFetchResponse::ok(vec![])))
    }
}

/// Scheduler double that only records requests.
#[derive(Default)]
pub struct RecordingScheduler {
    pub registered: Mutex<Vec<String>>,
    pub enqueued: Mutex<Vec<(String, TaskRequestOptions)>>,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue_count(&self) -> usize {
        self.enqueued.lock().expect("lock").len()
    }
}

impl TaskScheduler for RecordingScheduler {
    fn register(&self, task_id: &str, _handler: Arc<dyn TaskHandler>) {
        self.registered.lock().expect("lock").push(task_id.to_string());
    }

    fn enqueue(&self, task_id: &str, options: TaskRequestOptions) {
        self.enqueued
            .lock()
            .expect("lock")
            .push((task_id.to_string(), options));
    }
}

/// Store whose writes always fail.
#[derive(Default)]
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get_bytes(&self, _key: &str) -> PersistResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set_bytes(&self, _key: &str, _bytes: &[u8]) -> PersistResult<()> {
        Err(PersistError::Message("disk full".to_string()))
    }

    fn remove(&self, _key: &str) -> PersistResult<()> {
        Err(PersistError::Message("disk full".to_string()))
    }
}

/// A sync engine wired to in-memory collaborators.
pub struct EngineFixture {
    pub identity: Arc<Identity>,
    pub privacy: Arc<PrivacyManager>,
    pub store: Arc<MemoryStore>,
    pub log: Arc<MutationLog>,
    pub clock: ManualClock,
    pub cache: Arc<CachedValue<Vec<ListId>>>,
    pub api: Arc<FakeApi>,
    pub scheduler: Arc<RecordingScheduler>,
    pub engine: Arc<SyncEngine>,
}

impl EngineFixture {
    pub fn new() -> Self {
        let identity = Arc::new(Identity::new());
        identity.set_channel_id(Some("channel-1".to_string()));
        identity.set_enabled(true);

        let privacy = Arc::new(PrivacyManager::all_enabled());
        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(MutationLog::open(store.clone(), LOG_KEY));
        let clock = ManualClock::new(1_000);
        let cache = Arc::new(CachedValue::new(Arc::new(clock.clone()), 600_000));
        let api = FakeApi::new();
        let scheduler = RecordingScheduler::new();

        let engine = Arc::new(SyncEngine::new(
            TASK_ID,
            identity.clone(),
            privacy.clone(),
            log.clone(),
            cache.clone(),
            api.clone(),
            scheduler.clone(),
        ));

        Self {
            identity,
            privacy,
            store,
            log,
            clock,
            cache,
            api,
            scheduler,
            engine,
        }
    }
}
