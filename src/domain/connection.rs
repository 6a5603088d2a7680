//! Ports to the connectivity-negotiation collaborator

use crate::domain::media::{MediaTrack, RemoteTrack};
use crate::domain::shared::{Candidate, NegotiationError, PeerId, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Transport-level connection state reported by the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// `Disconnected` may recover on its own and is not terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportState::Failed | TransportState::Closed)
    }
}

/// Notifications emitted by a connection, unordered and multi-shot
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A local candidate was discovered; `None` marks end of gathering
    LocalCandidate(Option<Candidate>),
    /// A remote track arrived
    TrackAdded(RemoteTrack),
    StateChanged(TransportState),
}

pub type ConnectionEvents = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Underlying peer connection handle
#[async_trait]
pub trait RtcConnection: Send + Sync {
    async fn add_track(&self, track: &MediaTrack) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: Candidate) -> Result<(), NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

/// A freshly created connection with its event stream
pub struct NewConnection {
    pub connection: Arc<dyn RtcConnection>,
    pub events: ConnectionEvents,
}

/// Factory for peer connections
#[async_trait]
pub trait RtcConnector: Send + Sync {
    async fn connect(&self, peer: &PeerId) -> Result<NewConnection, NegotiationError>;
}
