//! Edit builders handed out by the audience manager.
//!
//! Each editor collects edits and hands them to its commit closure on
//! [`apply`](SubscriptionListEditor::apply). Dropping an editor without
//! applying discards its edits.

use serde_json::Value;
use tracing::warn;

use crate::edit::{AttributeEdit, SubscriptionListEdit, TagGroupEdit};

/// Reserved tag group managed by the device itself.
pub const DEVICE_TAG_GROUP: &str = "ua_device";
/// Longest accepted string attribute value, in characters.
pub const MAX_ATTRIBUTE_STRING_LEN: usize = 1024;

type Commit<T> = Box<dyn FnOnce(Vec<T>) + Send>;

fn normalized(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Builder for subscription list edits.
pub struct SubscriptionListEditor {
    edits: Vec<SubscriptionListEdit>,
    commit: Commit<SubscriptionListEdit>,
}

impl SubscriptionListEditor {
    pub fn new(commit: impl FnOnce(Vec<SubscriptionListEdit>) + Send + 'static) -> Self {
        Self {
            edits: Vec::new(),
            commit: Box::new(commit),
        }
    }

    pub fn subscribe(&mut self, list_id: &str) -> &mut Self {
        match normalized(list_id) {
            Some(id) => self.edits.push(SubscriptionListEdit::subscribe(id)),
            None => warn!("ignoring subscribe with empty list id"),
        }
        self
    }

    pub fn unsubscribe(&mut self, list_id: &str) -> &mut Self {
        match normalized(list_id) {
            Some(id) => self.edits.push(SubscriptionListEdit::unsubscribe(id)),
            None => warn!("ignoring unsubscribe with empty list id"),
        }
        self
    }

    pub fn apply(self) {
        (self.commit)(self.edits);
    }
}

/// Builder for tag group edits.
pub struct TagGroupsEditor {
    allow_device_group: bool,
    edits: Vec<TagGroupEdit>,
    commit: Commit<TagGroupEdit>,
}

impl TagGroupsEditor {
    /// `allow_device_group` permits edits to [`DEVICE_TAG_GROUP`].
    pub fn new(allow_device_group: bool, commit: impl FnOnce(Vec<TagGroupEdit>) + Send + 'static) -> Self {
        Self {
            allow_device_group,
            edits: Vec::new(),
            commit: Box::new(commit),
        }
    }

    pub fn add_tag(&mut self, tag: &str, group: &str) -> &mut Self {
        self.add_tags([tag], group)
    }

    pub fn add_tags<I, S>(&mut self, tags: I, group: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(group) = self.checked_group(group) {
            for tag in tags.into_iter().filter_map(|t| normalized(t.as_ref())) {
                self.edits.push(TagGroupEdit::add(group.clone(), tag));
            }
        }
        self
    }

    pub fn remove_tag(&mut self, tag: &str, group: &str) -> &mut Self {
        self.remove_tags([tag], group)
    }

    pub fn remove_tags<I, S>(&mut self, tags: I, group: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(group) = self.checked_group(group) {
            for tag in tags.into_iter().filter_map(|t| normalized(t.as_ref())) {
                self.edits.push(TagGroupEdit::remove(group.clone(), tag));
            }
        }
        self
    }

    pub fn apply(self) {
        (self.commit)(self.edits);
    }

    fn checked_group(&self, group: &str) -> Option<String> {
        let Some(group) = normalized(group) else {
            warn!("ignoring tag edit with empty group");
            return None;
        };
        if group == DEVICE_TAG_GROUP && !self.allow_device_group {
            warn!(group = %group, "device tag group edits are not allowed");
            return None;
        }
        Some(group)
    }
}

/// Builder for attribute edits.
pub struct AttributesEditor {
    edits: Vec<AttributeEdit>,
    commit: Commit<AttributeEdit>,
}

impl AttributesEditor {
    pub fn new(commit: impl FnOnce(Vec<AttributeEdit>) + Send + 'static) -> Self {
        Self {
            edits: Vec::new(),
            commit: Box::new(commit),
        }
    }

    /// Sets `key` to `value`.
    ///
    /// Empty keys, empty strings, and strings longer than
    /// [`MAX_ATTRIBUTE_STRING_LEN`] characters are rejected.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let Some(key) = normalized(key) else {
            warn!("ignoring attribute with empty key");
            return self;
        };
        let value = value.into();
        if let Value::String(s) = &value {
            let len = s.chars().count();
            if len == 0 || len > MAX_ATTRIBUTE_STRING_LEN {
                warn!(key = %key, len, "ignoring attribute with invalid string length");
                return self;
            }
        }
        self.edits.push(AttributeEdit::set(key, value));
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        match normalized(key) {
            Some(key) => self.edits.push(AttributeEdit::remove(key)),
            None => warn!("ignoring attribute removal with empty key"),
        }
        self
    }

    pub fn apply(self) {
        (self.commit)(self.edits);
    }
}
