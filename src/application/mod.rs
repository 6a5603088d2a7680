//! Application layer - Room orchestration
//!
//! The session owns the registry and drives one actor task per remote
//! participant.

pub mod peer;
pub mod registry;
pub mod session;

pub use peer::{PeerCommand, PeerController, PeerExit, PeerHandle};
pub use registry::PeerRegistry;
pub use session::{Session, SessionDeps};
