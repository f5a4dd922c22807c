//! Tracking events waiting for an ack
//!
//! When an event asking for an ack is sent, its callback is added to the
//! pending map under a freshly allocated id. When the ack arrives, the
//! callback is taken out by id and handed back to the dispatcher.

use std::collections::HashMap;

use serde_json::Value;

use crate::packet::Id;

/// Callback run when an ack arrives, with the ack's name and data.
pub type AckCallback = Box<dyn FnOnce(Option<String>, Option<Value>) + Send>;

/// Id allocation plus the callbacks waiting for acks.
pub(crate) struct PendingAcks {
    next_id: Id,
    pending: HashMap<Id, AckCallback>,
}

impl PendingAcks {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Allocate the next id and register `callback` under it
    pub(crate) fn register(&mut self, callback: AckCallback) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, callback);
        id
    }

    /// Remove and return the callback for `id`, if any
    pub(crate) fn take(&mut self, id: Id) -> Option<AckCallback> {
        self.pending.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: Id) -> bool {
        self.pending.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> AckCallback {
        Box::new(|_, _| {})
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut acks = PendingAcks::new();
        let ids: Vec<Id> = (0..4).map(|_| acks.register(noop())).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ids_are_not_reused_after_take() {
        let mut acks = PendingAcks::new();
        let first = acks.register(noop());
        assert!(acks.take(first).is_some());

        let second = acks.register(noop());
        assert_eq!(second, 2);
        assert!(!acks.contains(first));
    }

    #[test]
    fn take_is_single_use() {
        let mut acks = PendingAcks::new();
        let id = acks.register(noop());

        assert!(acks.take(id).is_some());
        assert!(acks.take(id).is_none());
        assert_eq!(acks.len(), 0);
    }

    #[test]
    fn take_unknown_id() {
        let mut acks = PendingAcks::new();
        assert!(acks.take(42).is_none());
    }
}
