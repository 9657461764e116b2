//! Atomic audience edits: subscription lists, tag groups, and attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ListId;

/// Subscription list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionListOp {
    /// Subscribe the channel to the list.
    Subscribe,
    /// Unsubscribe the channel from the list.
    Unsubscribe,
}

/// One subscribe/unsubscribe edit for a single list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionListEdit {
    /// Target list.
    pub list_id: ListId,
    /// Operation applied to the list.
    pub op: SubscriptionListOp,
}

impl SubscriptionListEdit {
    /// Builds a subscribe edit.
    pub fn subscribe(list_id: impl Into<ListId>) -> Self {
        Self {
            list_id: list_id.into(),
            op: SubscriptionListOp::Subscribe,
        }
    }

    /// Builds an unsubscribe edit.
    pub fn unsubscribe(list_id: impl Into<ListId>) -> Self {
        Self {
            list_id: list_id.into(),
            op: SubscriptionListOp::Unsubscribe,
        }
    }
}

/// Tag group operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagGroupOp {
    /// Add the tag to the group.
    Add,
    /// Remove the tag from the group.
    Remove,
}

/// One add/remove edit for a single tag within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagGroupEdit {
    /// Tag group name.
    pub group: String,
    /// Tag within the group.
    pub tag: String,
    /// Operation applied to the tag.
    pub op: TagGroupOp,
}

impl TagGroupEdit {
    /// Builds an add edit.
    pub fn add(group: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            tag: tag.into(),
            op: TagGroupOp::Add,
        }
    }

    /// Builds a remove edit.
    pub fn remove(group: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            tag: tag.into(),
            op: TagGroupOp::Remove,
        }
    }
}

/// Attribute operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "value")]
pub enum AttributeOp {
    /// Set the attribute to a JSON value.
    Set(Value),
    /// Remove the attribute.
    Remove,
}

/// One set/remove edit for a single attribute key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEdit {
    /// Attribute key.
    pub key: String,
    /// Operation applied to the key.
    pub op: AttributeOp,
}

impl AttributeEdit {
    /// Builds a set edit.
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            op: AttributeOp::Set(value.into()),
        }
    }

    /// Builds a remove edit.
    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: AttributeOp::Remove,
        }
    }
}
