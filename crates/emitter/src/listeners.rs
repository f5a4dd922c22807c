//! Application listener registry.
//!
//! Connections use [`Listeners`] to implement [`Connection::emit`](crate::Connection::emit).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connection::IncomingEvent;

/// Listener invoked with an incoming event.
pub type Listener = Arc<dyn Fn(&IncomingEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    named: HashMap<String, Vec<Listener>>,
    any: Vec<Listener>,
}

/// Listeners keyed by event name, plus catch-all listeners.
#[derive(Default)]
pub struct Listeners {
    registry: Mutex<Registry>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for events called `name`.
    pub fn on<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&IncomingEvent) + Send + Sync + 'static,
    {
        self.lock()
            .named
            .entry(name.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Register a listener for every event.
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&IncomingEvent) + Send + Sync + 'static,
    {
        self.lock().any.push(Arc::new(listener));
    }

    /// Invoke the listeners for `event.name`, then the catch-all listeners.
    ///
    /// Returns the number of listeners invoked. The registry is not locked
    /// while listeners run.
    pub fn emit(&self, event: &IncomingEvent) -> usize {
        let to_call: Vec<Listener> = {
            let registry = self.lock();
            registry
                .named
                .get(&event.name)
                .into_iter()
                .flatten()
                .chain(registry.any.iter())
                .cloned()
                .collect()
        };

        if to_call.is_empty() {
            tracing::trace!(name = %event.name, "no listeners for event");
        }
        for listener in &to_call {
            listener(event);
        }
        to_call.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
