//! Update batch model and its persisted envelope.

use serde::{Deserialize, Serialize};

use crate::edit::{AttributeEdit, SubscriptionListEdit, TagGroupEdit};

/// Version number for serialized [`LogEnvelope`] payloads.
pub const LOG_FORMAT_VERSION: u16 = 1;

/// Edits recorded by a single enqueue event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateBatch {
    /// Subscription list edits, in order.
    #[serde(default)]
    pub subscription_lists: Vec<SubscriptionListEdit>,
    /// Tag group edits, in order.
    #[serde(default)]
    pub tag_groups: Vec<TagGroupEdit>,
    /// Attribute edits, in order.
    #[serde(default)]
    pub attributes: Vec<AttributeEdit>,
}

impl UpdateBatch {
    /// Batch holding only subscription list edits.
    pub fn subscription_lists(edits: Vec<SubscriptionListEdit>) -> Self {
        Self {
            subscription_lists: edits,
            ..Self::default()
        }
    }

    /// Batch holding only tag group edits.
    pub fn tag_groups(edits: Vec<TagGroupEdit>) -> Self {
        Self {
            tag_groups: edits,
            ..Self::default()
        }
    }

    /// Batch holding only attribute edits.
    pub fn attributes(edits: Vec<AttributeEdit>) -> Self {
        Self {
            attributes: edits,
            ..Self::default()
        }
    }

    /// Returns true when no edits of any kind are present.
    pub fn is_empty(&self) -> bool {
        self.subscription_lists.is_empty() && self.tag_groups.is_empty() && self.attributes.is_empty()
    }

    /// Total number of atomic edits.
    pub fn len(&self) -> usize {
        self.subscription_lists.len() + self.tag_groups.len() + self.attributes.len()
    }
}

/// Versioned wrapper for the persisted log blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Pending batches in enqueue order.
    pub batches: Vec<UpdateBatch>,
}

impl LogEnvelope {
    /// Constructs an envelope using [`LOG_FORMAT_VERSION`].
    pub fn new(batches: Vec<UpdateBatch>) -> Self {
        Self {
            format_version: LOG_FORMAT_VERSION,
            batches,
        }
    }
}
