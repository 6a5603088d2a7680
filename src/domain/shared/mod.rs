//! Shared kernel - identities, opaque payloads and errors

pub mod error;
pub mod value_objects;

pub use error::{DecodeError, MediaAcquisitionError, NegotiationError, SessionError};
pub use value_objects::*;
