//! Observer event payloads.

use crate::edit::{AttributeEdit, TagGroupEdit};

/// Events broadcast by the audience manager.
#[derive(Debug, Clone, PartialEq)]
pub enum AudienceEvent {
    /// A collapsed batch was accepted by the server.
    Updated {
        /// Tag group edits that were applied.
        tag_groups: Vec<TagGroupEdit>,
        /// Attribute edits that were applied.
        attributes: Vec<AttributeEdit>,
    },
}
