//! Domain layer - Room vocabulary and collaborator ports
//!
//! This layer contains:
//! - Value objects: identities and opaque negotiation payloads
//! - The negotiation state machine values
//! - Media handles and the capture/rendering ports
//! - The connection port implemented by the negotiation collaborator

pub mod connection;
pub mod media;
pub mod negotiation;
pub mod shared;

// Re-export commonly used types
pub use negotiation::{NegotiationState, Role};
pub use shared::{
    Candidate, DecodeError, MediaAcquisitionError, NegotiationError, PeerId, SessionDescription,
    SessionError,
};
