//! Local and remote media handles
//!
//! The core never touches media samples. Local tracks are opaque handles
//! produced by a [`MediaSource`] and attached to connections; remote tracks
//! are descriptors accumulated per peer and handed to a [`StreamRenderer`].

use crate::domain::shared::{MediaAcquisitionError, PeerId};
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// Handle to the capture collaborator's track object
pub type TrackHandle = Arc<dyn Any + Send + Sync>;

/// A local track, shared with every connection it is attached to
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    stream_id: String,
    kind: TrackKind,
    handle: TrackHandle,
}

impl MediaTrack {
    pub fn new(
        id: impl Into<String>,
        stream_id: impl Into<String>,
        kind: TrackKind,
        handle: TrackHandle,
    ) -> Self {
        Self {
            id: id.into(),
            stream_id: stream_id.into(),
            kind,
            handle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn handle(&self) -> &TrackHandle {
        &self.handle
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Every local track available after capture, possibly spanning several
/// streams (e.g. a screen capture plus a separate microphone)
#[derive(Debug, Clone, Default)]
pub struct MediaBundle {
    tracks: Vec<MediaTrack>,
}

impl MediaBundle {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn push(&mut self, track: MediaTrack) {
        self.tracks.push(track);
    }

    /// Append all tracks of another stream
    pub fn extend(&mut self, other: MediaBundle) {
        self.tracks.extend(other.tracks);
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// What to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Local capture collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaBundle, MediaAcquisitionError>;
}

/// A track received from a remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// Live handle onto the remote tracks of one peer, in arrival order
///
/// Clones share the same track list. Tracks keep accumulating after the
/// stream has been handed to a renderer.
#[derive(Debug, Clone)]
pub struct RemoteStream {
    tracks: Arc<watch::Sender<Vec<RemoteTrack>>>,
}

impl RemoteStream {
    pub fn new() -> Self {
        let (tracks, _) = watch::channel(Vec::new());
        Self {
            tracks: Arc::new(tracks),
        }
    }

    pub fn add_track(&self, track: RemoteTrack) {
        self.tracks.send_modify(|tracks| tracks.push(track));
    }

    /// Snapshot of the tracks received so far
    pub fn tracks(&self) -> Vec<RemoteTrack> {
        self.tracks.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tracks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.borrow().is_empty()
    }

    /// Wait for tracks that arrive later
    pub fn subscribe(&self) -> watch::Receiver<Vec<RemoteTrack>> {
        self.tracks.subscribe()
    }

    /// True when both handles view the same stream
    pub fn same_stream(&self, other: &RemoteStream) -> bool {
        Arc::ptr_eq(&self.tracks, &other.tracks)
    }
}

impl Default for RemoteStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Rendering collaborator, told once per peer when its media is flowing
#[cfg_attr(test, mockall::automock)]
pub trait StreamRenderer: Send + Sync {
    fn on_remote_stream_ready(&self, peer: &PeerId, stream: RemoteStream);
}
