//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - The signaling wire codec and outbound signaller
//! - The relay channel over WebSocket
//! - WebRTC-backed connection and media adapters

pub mod relay;
pub mod signaling;
pub mod webrtc;
