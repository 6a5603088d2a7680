//! Negotiation state machine values

use std::fmt;

/// Negotiation state of one peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    /// Controller exists, nothing exchanged yet
    New,
    /// Local offer set and sent, waiting for the answer
    HaveLocalOffer,
    /// Remote offer applied, answer not yet set
    HaveRemoteOffer,
    /// Both descriptions set, waiting for the transport to connect
    Negotiating,
    /// Transport connected and media exposed
    Connected,
    /// Terminal
    Closed,
}

impl NegotiationState {
    /// Check if state transition is valid
    pub fn can_transition_to(&self, next: NegotiationState) -> bool {
        use NegotiationState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,

            (New, HaveLocalOffer) => true,
            (New, HaveRemoteOffer) => true,

            (HaveLocalOffer, Negotiating) => true,
            (HaveRemoteOffer, Negotiating) => true,

            (Negotiating, Connected) => true,

            _ => false,
        }
    }

    /// Whether a remote description has been applied
    pub fn has_remote_description(&self) -> bool {
        matches!(
            self,
            NegotiationState::HaveRemoteOffer
                | NegotiationState::Negotiating
                | NegotiationState::Connected
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, NegotiationState::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationState::New => "new",
            NegotiationState::HaveLocalOffer => "have-local-offer",
            NegotiationState::HaveRemoteOffer => "have-remote-offer",
            NegotiationState::Negotiating => "negotiating",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the offer/answer exchange a controller plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Offerer => f.write_str("offerer"),
            Role::Answerer => f.write_str("answerer"),
        }
    }
}
