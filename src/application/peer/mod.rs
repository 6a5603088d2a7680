//! Remote participant lifecycle
pub mod controller;
pub mod task;

pub use controller::PeerController;
pub use task::{spawn_peer, PeerCommand, PeerExit, PeerHandle, RoomContext};
