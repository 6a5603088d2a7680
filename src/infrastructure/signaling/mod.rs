//! Signaling protocol: wire model, codec and outbound path
pub mod codec;
pub mod message;
pub mod signaller;

pub use codec::{decode, encode};
pub use message::{Outgoing, SignalingMessage};
pub use signaller::Signaller;
