//! Net-effect reduction of queued audience edits.
//!
//! Every collapse is last-write-wins per target key. Output keeps the order in
//! which each key was first seen, so collapsing an already collapsed sequence
//! returns it unchanged.

use hashbrown::HashMap;

use crate::{
    batch::UpdateBatch,
    edit::{AttributeEdit, SubscriptionListEdit, SubscriptionListOp, TagGroupEdit, TagGroupOp},
    types::ListId,
};

/// Collapses every kind of edit across `batches` into one batch.
///
/// Returns `None` when nothing is left after collapsing, so callers clear the
/// log instead of storing a vacuous batch.
pub fn collapse(batches: &[UpdateBatch]) -> Option<UpdateBatch> {
    let mut subscription_lists = Vec::new();
    let mut tag_groups = Vec::new();
    let mut attributes = Vec::new();

    for batch in batches {
        subscription_lists.extend(batch.subscription_lists.iter().cloned());
        tag_groups.extend(batch.tag_groups.iter().cloned());
        attributes.extend(batch.attributes.iter().cloned());
    }

    let collapsed = UpdateBatch {
        subscription_lists: collapse_subscription_lists(&subscription_lists),
        tag_groups: collapse_tag_groups(&tag_groups),
        attributes: collapse_attributes(&attributes),
    };

    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Keeps the last operation per list id.
///
/// When the window opens with a subscribe and ends with an unsubscribe for
/// the same list, the pair cancels and the list id drops out entirely. A
/// window opening with an unsubscribe keeps it.
pub fn collapse_subscription_lists(edits: &[SubscriptionListEdit]) -> Vec<SubscriptionListEdit> {
    let mut order: Vec<(&str, SubscriptionListOp)> = Vec::new();
    let mut last: HashMap<&str, SubscriptionListOp> = HashMap::new();

    for edit in edits {
        let id = edit.list_id.as_str();
        if last.insert(id, edit.op).is_none() {
            order.push((id, edit.op));
        }
    }

    order
        .into_iter()
        .filter_map(|(id, first)| {
            let op = last[id];
            if first == SubscriptionListOp::Subscribe && op == SubscriptionListOp::Unsubscribe {
                return None;
            }
            Some(SubscriptionListEdit {
                list_id: id.to_string(),
                op,
            })
        })
        .collect()
}

/// Keeps the last operation per `(group, tag)`, grouped by group.
pub fn collapse_tag_groups(edits: &[TagGroupEdit]) -> Vec<TagGroupEdit> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut group_pos: HashMap<&str, usize> = HashMap::new();
    let mut last: HashMap<(&str, &str), TagGroupOp> = HashMap::new();

    for edit in edits {
        let group = edit.group.as_str();
        let tag = edit.tag.as_str();
        let pos = *group_pos.entry(group).or_insert_with(|| {
            groups.push((group, Vec::new()));
            groups.len() - 1
        });
        if last.insert((group, tag), edit.op).is_none() {
            groups[pos].1.push(tag);
        }
    }

    groups
        .into_iter()
        .flat_map(|(group, tags)| {
            let last = &last;
            tags.into_iter().map(move |tag| TagGroupEdit {
                group: group.to_string(),
                tag: tag.to_string(),
                op: last[&(group, tag)],
            })
        })
        .collect()
}

/// Keeps the last operation per attribute key.
pub fn collapse_attributes(edits: &[AttributeEdit]) -> Vec<AttributeEdit> {
    let mut order: Vec<&str> = Vec::new();
    let mut last: HashMap<&str, usize> = HashMap::new();

    for (idx, edit) in edits.iter().enumerate() {
        if last.insert(edit.key.as_str(), idx).is_none() {
            order.push(edit.key.as_str());
        }
    }

    order
        .into_iter()
        .map(|key| edits[last[key]].clone())
        .collect()
}

/// Applies pending subscription list edits to a server snapshot.
pub fn overlay_subscription_lists(
    mut snapshot: Vec<ListId>,
    pending: &[SubscriptionListEdit],
) -> Vec<ListId> {
    for edit in pending {
        match edit.op {
            SubscriptionListOp::Subscribe => {
                if !snapshot.contains(&edit.list_id) {
                    snapshot.push(edit.list_id.clone());
                }
            }
            SubscriptionListOp::Unsubscribe => {
                snapshot.retain(|id| id != &edit.list_id);
            }
        }
    }
    snapshot
}
