//! Meshroom - full-mesh WebRTC room client
//!
//! Joins a room through a thin signaling relay and negotiates one
//! peer-to-peer media connection with every other participant.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use application::{Session, SessionDeps};
pub use config::{Config, ConfigError};
pub use domain::shared::error::SessionError;
pub use domain::shared::value_objects::PeerId;
