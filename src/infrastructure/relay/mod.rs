//! Relay channel
//!
//! The relay is an ordered, full-duplex text channel. The session only sees
//! a [`RelayLink`]: two queues that stay open for as long as the underlying
//! transport does. Dropping either end closes the link.

pub mod websocket;

use crate::domain::shared::SessionError;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use websocket::WebSocketRelay;

/// Session-side ends of an open relay channel
pub struct RelayLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Transport-side ends of a [`RelayLink`]
pub struct RelayEnds {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub inbound: mpsc::UnboundedSender<String>,
}

impl RelayLink {
    /// An in-memory link and the ends a transport (or a test) drives
    pub fn pair() -> (RelayLink, RelayEnds) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        (
            RelayLink {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            RelayEnds {
                outbound: outbound_rx,
                inbound: inbound_tx,
            },
        )
    }
}

/// Opens relay channels
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<RelayLink, SessionError>;
}
