/// Outbound signaling: stamps the local identity and writes to the relay
use super::codec;
use super::message::Outgoing;
use crate::domain::shared::{PeerId, SessionError};
use crate::interface::metrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Cloneable handle onto the relay's outbound side
///
/// Each successful [`Signaller::send`] is exactly one relay write. Once the
/// channel is closed no further writes are attempted.
#[derive(Clone)]
pub struct Signaller {
    local: PeerId,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Signaller {
    pub fn new(local: PeerId, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            local,
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local
    }

    pub fn send(&self, message: Outgoing) -> Result<(), SessionError> {
        if self.is_closed() {
            debug!("Relay channel closed, not sending");
            return Err(SessionError::ChannelClosed);
        }

        let message = message.stamp(self.local.clone());
        let kind = message.kind();
        let wire = codec::encode(&message).inspect_err(|e| {
            error!("Failed to serialize {} message: {}", kind, e);
        })?;

        if self.outbound.send(wire).is_err() {
            warn!("Relay channel dropped while sending {} message", kind);
            self.close();
            return Err(SessionError::ChannelClosed);
        }

        debug!("Sent {} message", kind);
        metrics::record_sent(kind);
        Ok(())
    }

    /// Mark the relay channel as gone for every clone of this handle
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.outbound.is_closed()
    }
}
