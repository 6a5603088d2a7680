//! WebRTC collaborator adapters
pub mod connector;
pub mod media;

pub use connector::{WebRtcConnection, WebRtcConnector};
pub use media::SyntheticMediaSource;
