//! One-shot reply handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::connection::Connection;
use crate::error::EmitterError;
use crate::packet::{Id, Packet};

/// Answers an incoming event that asked for an acknowledgement.
///
/// At most one ack packet is written per handle, no matter how many times
/// [`Reply::send`] is called. Clones share the same state, so this holds
/// across clones too.
#[derive(Clone)]
pub struct Reply {
    id: Id,
    conn: Weak<dyn Connection>,
    sent: Arc<AtomicBool>,
}

impl Reply {
    pub(crate) fn new(id: Id, conn: Weak<dyn Connection>) -> Self {
        Self {
            id,
            conn,
            sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The id of the event being answered.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Whether an ack has already been sent through this handle.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Send the ack, forwarding `name` and `data` verbatim.
    ///
    /// Returns `Ok(false)` without writing anything if an ack was already sent.
    #[tracing::instrument(skip(self, data), fields(id = self.id), level = "debug")]
    pub fn send(&self, name: Option<String>, data: Option<Value>) -> Result<bool, EmitterError> {
        if self.sent.swap(true, Ordering::SeqCst) {
            tracing::debug!("ack already sent");
            return Ok(false);
        }

        let conn = self.conn.upgrade().ok_or(EmitterError::ConnectionDropped)?;
        conn.write(Packet::ack(self.id, name, data))?;
        tracing::debug!("ack sent");
        Ok(true)
    }

    /// Send an ack with neither name nor data.
    pub fn ack(&self) -> Result<bool, EmitterError> {
        self.send(None, None)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("id", &self.id)
            .field("sent", &self.is_sent())
            .finish()
    }
}
