//! Remote API client interfaces for subscription lists and bulk updates.
//!
//! Requests are plain futures: dropping one before it resolves cancels the
//! in-flight call.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    batch::UpdateBatch,
    types::ListId,
};

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection, TLS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The request was cancelled before a response arrived.
    #[error("request cancelled")]
    Cancelled,
}

/// Response to a subscription list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionListFetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Subscribed list ids; present on success.
    pub list_ids: Option<Vec<ListId>>,
}

impl SubscriptionListFetchResponse {
    /// Successful response carrying `list_ids`.
    pub fn ok(list_ids: Vec<ListId>) -> Self {
        Self {
            status: 200,
            list_ids: Some(list_ids),
        }
    }

    /// Response with `status` and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            list_ids: None,
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Response to a bulk audience update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResponse {
    /// HTTP status code.
    pub status: u16,
}

impl UpdateResponse {
    /// Response with `status`.
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for 5xx.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Fetches the channel's subscription lists as the server knows them.
#[async_trait]
pub trait SubscriptionListClient: Send + Sync + 'static {
    /// Fetches the lists `channel_id` is subscribed to.
    async fn get(&self, channel_id: &str) -> Result<SubscriptionListFetchResponse, ApiError>;
}

/// Submits collapsed audience edits for a channel.
#[async_trait]
pub trait UpdateClient: Send + Sync + 'static {
    /// Sends every edit in `batch` as one request.
    async fn update(&self, channel_id: &str, batch: &UpdateBatch) -> Result<UpdateResponse, ApiError>;
}
