//! Offline-tolerant audience update queue with collapse-and-sync.
//!
//! Subscription list, tag group, and attribute edits are appended to a
//! persisted log, collapsed to their net effect, and pushed to a remote API by
//! a scheduled task that retries with backoff.
//!
//! # Examples
//!
//! Collapsing queued batches with [`core::collapse::collapse`]:
//! ```
//! use audiencesync::{
//!     batch::UpdateBatch,
//!     core::collapse::collapse,
//!     edit::{AttributeEdit, SubscriptionListEdit},
//! };
//!
//! let batches = vec![
//!     UpdateBatch::subscription_lists(vec![SubscriptionListEdit::subscribe("news")]),
//!     UpdateBatch::attributes(vec![AttributeEdit::set("level", 1)]),
//!     UpdateBatch::attributes(vec![AttributeEdit::set("level", 2)]),
//! ];
//! let net = collapse(&batches).expect("net change");
//! assert_eq!(net.subscription_lists, vec![SubscriptionListEdit::subscribe("news")]);
//! assert_eq!(net.attributes, vec![AttributeEdit::set("level", 2)]);
//! ```
//!
//! Wiring the manager to a scheduler and SQLite store:
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use audiencesync::{
//!     api::{ApiError, SubscriptionListClient, SubscriptionListFetchResponse, UpdateClient, UpdateResponse},
//!     batch::UpdateBatch,
//!     config::AudienceConfig,
//!     consent::PrivacyManager,
//!     manager::{AudienceDeps, AudienceManager},
//!     persist::sqlite::SqliteStore,
//!     runtime::scheduler::{spawn_scheduler, SchedulerConfig},
//!     types::SystemClock,
//! };
//!
//! struct Api;
//!
//! #[async_trait]
//! impl SubscriptionListClient for Api {
//!     async fn get(&self, _channel_id: &str) -> Result<SubscriptionListFetchResponse, ApiError> {
//!         Ok(SubscriptionListFetchResponse::ok(vec![]))
//!     }
//! }
//!
//! #[async_trait]
//! impl UpdateClient for Api {
//!     async fn update(&self, _channel_id: &str, _batch: &UpdateBatch) -> Result<UpdateResponse, ApiError> {
//!         Ok(UpdateResponse::new(200))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let api = Arc::new(Api);
//! let manager = AudienceManager::new(
//!     AudienceDeps {
//!         store: Arc::new(SqliteStore::open("audience.db").expect("open sqlite")),
//!         scheduler: Arc::new(spawn_scheduler(SchedulerConfig::default())),
//!         subscription_list_client: api.clone(),
//!         update_client: api,
//!         consent: Arc::new(PrivacyManager::all_enabled()),
//!         clock: Arc::new(SystemClock),
//!     },
//!     AudienceConfig::default(),
//! );
//! manager.set_channel_id(Some("channel-id".to_string()));
//! manager.set_enabled(true);
//!
//! let mut editor = manager.edit_subscription_lists();
//! editor.subscribe("news");
//! editor.apply();
//!
//! let lists = manager.fetch_subscription_lists().await.expect("lists");
//! assert!(lists.contains(&"news".to_string()));
//! # }
//! ```

/// Remote API client interfaces.
pub mod api;
/// Update batch model and persisted envelope.
pub mod batch;
/// Audience manager configuration.
pub mod config;
/// Consent gate interface and privacy manager.
pub mod consent;
/// Pending-update log, collapse engine, and snapshot cache.
pub mod core;
/// Atomic edit values.
pub mod edit;
/// Edit builders.
pub mod editor;
/// Update synchronization task.
pub mod engine;
/// Channel identity state.
pub mod identity;
/// Audience manager façade.
pub mod manager;
/// Key-value persistence abstraction and implementations.
pub mod persist;
/// Task scheduling runtime and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
