//! Error taxonomy of the signaling core

use crate::domain::negotiation::NegotiationState;
use thiserror::Error;

/// A signaling message that could not be decoded. Always dropped by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message has no type field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed {kind} message: {reason}")]
    Malformed { kind: String, reason: String },
}

/// Local capture failed. Fatal to a join attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaAcquisitionError {
    #[error("Media device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Permission to capture media was denied")]
    PermissionDenied,

    #[error("Media constraints cannot be satisfied: {0}")]
    Unsatisfiable(String),

    #[error("Media acquisition failed: {0}")]
    Other(String),
}

/// Description or candidate handling failed for one peer.
///
/// The affected controller closes; the session carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("Cannot {operation} in state {state}")]
    InvalidStateTransition {
        state: NegotiationState,
        operation: &'static str,
    },

    #[error("Session description rejected: {0}")]
    DescriptionRejected(String),

    #[error("Connectivity candidate rejected: {0}")]
    CandidateRejected(String),

    #[error("Failed to attach local track: {0}")]
    TrackAttach(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Session-level failures
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    MediaAcquisition(#[from] MediaAcquisitionError),

    #[error("Relay channel closed")]
    ChannelClosed,

    #[error("Failed to open relay channel: {0}")]
    RelayConnect(String),

    #[error("Failed to encode signaling message: {0}")]
    Encode(#[from] serde_json::Error),
}
