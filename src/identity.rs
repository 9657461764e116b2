//! Channel identity and enablement shared by the manager and sync engine.

use parking_lot::RwLock;

use crate::types::ChannelId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub channel_id: Option<ChannelId>,
    pub enabled: bool,
}

impl IdentitySnapshot {
    /// Channel id to sync for, when enabled and registered.
    pub fn sync_target(&self) -> Option<&str> {
        if self.enabled {
            self.channel_id.as_deref()
        } else {
            None
        }
    }
}

/// Lock-guarded [`IdentitySnapshot`]. Setters report whether anything changed.
#[derive(Debug, Default)]
pub struct Identity {
    state: RwLock<IdentitySnapshot>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        self.state.read().clone()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.state.read().channel_id.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    pub fn set_channel_id(&self, channel_id: Option<ChannelId>) -> bool {
        let mut state = self.state.write();
        if state.channel_id == channel_id {
            return false;
        }
        state.channel_id = channel_id;
        true
    }

    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut state = self.state.write();
        if state.enabled == enabled {
            return false;
        }
        state.enabled = enabled;
        true
    }
}
