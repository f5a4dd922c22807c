//! Connection configuration.

use std::collections::HashSet;

use emitter::DEFAULT_RESERVED_EVENTS;
use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_MESSAGE_SIZE;

/// Settings for a [`StreamConnection`](crate::StreamConnection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Largest packet body accepted from the peer, in bytes.
    pub max_message_size: usize,
    /// Event names never dispatched to application listeners.
    pub reserved: HashSet<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reserved: DEFAULT_RESERVED_EVENTS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Replace the reserved name set.
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved = names.into_iter().map(Into::into).collect();
        self
    }
}
