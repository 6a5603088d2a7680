//! Interface layer - Rendering collaborators and metrics

pub mod metrics;
pub mod renderer;

pub use renderer::{ChannelRenderer, LogRenderer};
