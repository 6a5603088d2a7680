/// Signaling message model exchanged over the relay
use crate::domain::shared::{Candidate, PeerId, SessionDescription};
use serde::{Deserialize, Serialize};

/// Signaling message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Announces a participant to the whole room
    Connected { from: PeerId, broadcast: bool },
    /// Roster of the other participants currently in the room
    Users { from: PeerId, users: Vec<PeerId> },
    /// SDP offer
    Offer {
        from: PeerId,
        to: PeerId,
        offer: SessionDescription,
    },
    /// SDP answer
    Answer {
        from: PeerId,
        to: PeerId,
        answer: SessionDescription,
    },
    /// ICE candidate
    IceCandidate {
        from: PeerId,
        to: PeerId,
        candidate: Candidate,
    },
}

impl SignalingMessage {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Connected { .. } => "connected",
            SignalingMessage::Users { .. } => "users",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "icecandidate",
        }
    }

    pub fn sender(&self) -> &PeerId {
        match self {
            SignalingMessage::Connected { from, .. }
            | SignalingMessage::Users { from, .. }
            | SignalingMessage::Offer { from, .. }
            | SignalingMessage::Answer { from, .. }
            | SignalingMessage::IceCandidate { from, .. } => from,
        }
    }

    /// Recipient of a directed message
    pub fn recipient(&self) -> Option<&PeerId> {
        match self {
            SignalingMessage::Offer { to, .. }
            | SignalingMessage::Answer { to, .. }
            | SignalingMessage::IceCandidate { to, .. } => Some(to),
            SignalingMessage::Connected { .. } | SignalingMessage::Users { .. } => None,
        }
    }
}

/// A message before the sender identity is stamped on it
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Connected,
    Offer {
        to: PeerId,
        offer: SessionDescription,
    },
    Answer {
        to: PeerId,
        answer: SessionDescription,
    },
    IceCandidate {
        to: PeerId,
        candidate: Candidate,
    },
}

impl Outgoing {
    pub fn stamp(self, from: PeerId) -> SignalingMessage {
        match self {
            Outgoing::Connected => SignalingMessage::Connected {
                from,
                broadcast: true,
            },
            Outgoing::Offer { to, offer } => SignalingMessage::Offer { from, to, offer },
            Outgoing::Answer { to, answer } => SignalingMessage::Answer { from, to, answer },
            Outgoing::IceCandidate { to, candidate } => {
                SignalingMessage::IceCandidate { from, to, candidate }
            }
        }
    }
}
