/// Rendering collaborators
use crate::domain::media::{RemoteStream, StreamRenderer};
use crate::domain::shared::PeerId;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Logs every remote stream that becomes ready
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRenderer;

impl StreamRenderer for LogRenderer {
    fn on_remote_stream_ready(&self, peer: &PeerId, stream: RemoteStream) {
        let kinds: Vec<String> = stream.tracks().iter().map(|t| t.kind.to_string()).collect();
        info!(
            "Remote stream from {} ready with {} tracks [{}]",
            peer,
            kinds.len(),
            kinds.join(", ")
        );
    }
}

/// Forwards ready streams to a consumer task
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    tx: mpsc::UnboundedSender<(PeerId, RemoteStream)>,
}

impl ChannelRenderer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(PeerId, RemoteStream)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamRenderer for ChannelRenderer {
    fn on_remote_stream_ready(&self, peer: &PeerId, stream: RemoteStream) {
        if self.tx.send((peer.clone(), stream)).is_err() {
            warn!("Stream consumer gone, dropping ready stream from {}", peer);
        }
    }
}
