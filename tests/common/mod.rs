//! Shared fakes for the session integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use futures::future::join_all;
use meshroom::config::Config;
use meshroom::domain::connection::{
    ConnectionEvent, NewConnection, RtcConnection, RtcConnector, TransportState,
};
use meshroom::domain::media::{
    MediaBundle, MediaConstraints, MediaSource, MediaTrack, RemoteStream, RemoteTrack,
    StreamRenderer, TrackKind,
};
use meshroom::domain::shared::{
    Candidate, MediaAcquisitionError, NegotiationError, PeerId, SessionDescription, SessionError,
};
use meshroom::infrastructure::relay::{RelayConnector, RelayEnds, RelayLink};
use meshroom::infrastructure::signaling::{decode, encode, SignalingMessage};
use meshroom::{Session, SessionDeps};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long `drive` lets sessions run. Tests run on a paused clock, so this
/// only bounds the loop once every task is idle.
pub const SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AddTrack(String),
    CreateOffer,
    CreateAnswer,
    SetLocal(Value),
    SetRemote(Value),
    AddCandidate(Value),
    Close,
}

/// Scripted connection: descriptions are canned blobs, and setting both
/// descriptions simulates a successful transport
pub struct FakeConnection {
    owner: PeerId,
    remote: PeerId,
    calls: Mutex<Vec<Call>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    auto_connect: bool,
    reject_remote: bool,
    has_local: AtomicBool,
    has_remote: AtomicBool,
    connected: AtomicBool,
}

impl FakeConnection {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AddCandidate(value) => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    pub fn count_remote_descriptions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::SetRemote(_)))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.calls().contains(&Call::Close)
    }

    /// Raise a transport notification as if the underlying stack did
    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn maybe_connect(&self) {
        if !self.auto_connect
            || !self.has_local.load(Ordering::SeqCst)
            || !self.has_remote.load(Ordering::SeqCst)
        {
            return;
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            self.emit(ConnectionEvent::StateChanged(TransportState::Connecting));
            self.emit(ConnectionEvent::StateChanged(TransportState::Connected));
        }
    }
}

pub fn offer_blob(from: &str, to: &str) -> Value {
    json!({ "type": "offer", "sdp": format!("offer {}->{}", from, to) })
}

pub fn answer_blob(from: &str, to: &str) -> Value {
    json!({ "type": "answer", "sdp": format!("answer {}->{}", from, to) })
}

pub fn candidate_blob(from: &str, to: &str, n: u32) -> Value {
    json!({ "candidate": format!("candidate:{} {}->{}", n, from, to), "sdpMLineIndex": 0 })
}

#[async_trait]
impl RtcConnection for FakeConnection {
    async fn add_track(&self, track: &MediaTrack) -> Result<(), NegotiationError> {
        self.record(Call::AddTrack(track.id().to_string()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(Call::CreateOffer);
        Ok(SessionDescription::new(offer_blob(
            self.owner.as_str(),
            self.remote.as_str(),
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.record(Call::CreateAnswer);
        Ok(SessionDescription::new(answer_blob(
            self.owner.as_str(),
            self.remote.as_str(),
        )))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.record(Call::SetLocal(description.into_value()));
        self.has_local.store(true, Ordering::SeqCst);
        self.emit(ConnectionEvent::LocalCandidate(Some(Candidate::new(
            candidate_blob(self.owner.as_str(), self.remote.as_str(), 1),
        ))));
        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.reject_remote {
            return Err(NegotiationError::DescriptionRejected(
                "scripted rejection".to_string(),
            ));
        }
        self.record(Call::SetRemote(description.into_value()));
        self.has_remote.store(true, Ordering::SeqCst);
        self.emit(ConnectionEvent::TrackAdded(RemoteTrack {
            id: format!("{}-mic", self.remote),
            stream_id: self.remote.to_string(),
            kind: TrackKind::Audio,
        }));
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Candidate) -> Result<(), NegotiationError> {
        self.record(Call::AddCandidate(candidate.into_value()));
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Hands out `FakeConnection`s and remembers every one it created
pub struct FakeConnector {
    owner: PeerId,
    auto_connect: bool,
    reject_next_remote: AtomicBool,
    connections: Mutex<Vec<(PeerId, Arc<FakeConnection>)>>,
}

impl FakeConnector {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.into(),
            auto_connect: true,
            reject_next_remote: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Connections never report a connected transport on their own
    pub fn stalled(owner: &str) -> Self {
        Self {
            auto_connect: false,
            ..Self::new(owner)
        }
    }

    /// The next connection created rejects every remote description
    pub fn reject_next_remote(&self) {
        self.reject_next_remote.store(true, Ordering::SeqCst);
    }

    /// Most recent connection for `peer`
    pub fn connection(&self, peer: &str) -> Option<Arc<FakeConnection>> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id.as_str() == peer)
            .map(|(_, connection)| connection.clone())
    }

    pub fn created(&self) -> Vec<PeerId> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn created_for(&self, peer: &str) -> usize {
        self.created().iter().filter(|id| id.as_str() == peer).count()
    }
}

#[async_trait]
impl RtcConnector for FakeConnector {
    async fn connect(&self, peer: &PeerId) -> Result<NewConnection, NegotiationError> {
        let (events, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(FakeConnection {
            owner: self.owner.clone(),
            remote: peer.clone(),
            calls: Mutex::new(Vec::new()),
            events,
            auto_connect: self.auto_connect,
            reject_remote: self.reject_next_remote.swap(false, Ordering::SeqCst),
            has_local: AtomicBool::new(false),
            has_remote: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        });
        self.connections
            .lock()
            .unwrap()
            .push((peer.clone(), connection.clone()));

        Ok(NewConnection {
            connection,
            events: rx,
        })
    }
}

/// One microphone and one camera track on a single local stream
pub struct FakeMedia;

#[async_trait]
impl MediaSource for FakeMedia {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaBundle, MediaAcquisitionError> {
        let mut bundle = MediaBundle::default();
        if constraints.audio {
            bundle.push(MediaTrack::new("mic", "local", TrackKind::Audio, Arc::new(())));
        }
        if constraints.video {
            bundle.push(MediaTrack::new("cam", "local", TrackKind::Video, Arc::new(())));
        }
        Ok(bundle)
    }
}

/// Records every media-ready notification
#[derive(Default)]
pub struct RecordingRenderer {
    ready: Mutex<Vec<(PeerId, RemoteStream)>>,
}

impl RecordingRenderer {
    pub fn count_for(&self, peer: &str) -> usize {
        self.ready
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == peer)
            .count()
    }

    pub fn total(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    pub fn stream_for(&self, peer: &str) -> Option<RemoteStream> {
        self.ready
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id.as_str() == peer)
            .map(|(_, stream)| stream.clone())
    }
}

impl StreamRenderer for RecordingRenderer {
    fn on_remote_stream_ready(&self, peer: &PeerId, stream: RemoteStream) {
        self.ready.lock().unwrap().push((peer.clone(), stream));
    }
}

/// Relay connector that hands out one pre-made link
pub struct ManualRelay {
    link: Mutex<Option<RelayLink>>,
}

impl ManualRelay {
    pub fn new() -> (Self, RelayEnds) {
        let (link, ends) = RelayLink::pair();
        (
            Self {
                link: Mutex::new(Some(link)),
            },
            ends,
        )
    }
}

#[async_trait]
impl RelayConnector for ManualRelay {
    async fn open(&self, _url: &str) -> Result<RelayLink, SessionError> {
        self.link
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SessionError::RelayConnect("link already taken".to_string()))
    }
}

#[derive(Default)]
struct HubState {
    peers: Vec<(PeerId, mpsc::UnboundedSender<String>)>,
    disconnected: HashSet<PeerId>,
    log: Vec<SignalingMessage>,
}

/// In-memory relay server: answers `connected` with the roster and routes
/// directed messages by `to`
#[derive(Default)]
pub struct FakeRelayHub {
    state: Mutex<HubState>,
}

impl FakeRelayHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connector(self: &Arc<Self>, id: &str) -> HubRelay {
        HubRelay {
            hub: self.clone(),
            id: id.into(),
        }
    }

    /// Drop a participant's relay channel
    pub fn disconnect(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        state.peers.retain(|(peer, _)| peer.as_str() != id);
        state.disconnected.insert(id.into());
    }

    /// Every message written by `id`, in order
    pub fn sent_by(&self, id: &str) -> Vec<SignalingMessage> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|message| message.sender().as_str() == id)
            .cloned()
            .collect()
    }

    fn route(&self, from: &PeerId, raw: &str) {
        let Ok(message) = decode(raw) else {
            return;
        };

        let mut state = self.state.lock().unwrap();
        state.log.push(message.clone());
        if state.disconnected.contains(from) {
            return;
        }

        match &message {
            SignalingMessage::Connected { .. } => {
                let roster = SignalingMessage::Users {
                    from: "relay".into(),
                    users: state.peers.iter().map(|(id, _)| id.clone()).collect(),
                };
                let roster = encode(&roster).unwrap();
                for (id, tx) in &state.peers {
                    let wire = if id == from {
                        roster.clone()
                    } else {
                        raw.to_string()
                    };
                    let _ = tx.send(wire);
                }
            }
            directed => {
                if let Some(to) = directed.recipient() {
                    if let Some((_, tx)) = state.peers.iter().find(|(id, _)| id == to) {
                        let _ = tx.send(raw.to_string());
                    }
                }
            }
        }
    }
}

pub struct HubRelay {
    hub: Arc<FakeRelayHub>,
    id: PeerId,
}

#[async_trait]
impl RelayConnector for HubRelay {
    async fn open(&self, _url: &str) -> Result<RelayLink, SessionError> {
        let (link, ends) = RelayLink::pair();
        let RelayEnds {
            mut outbound,
            inbound,
        } = ends;

        self.hub
            .state
            .lock()
            .unwrap()
            .peers
            .push((self.id.clone(), inbound));

        let hub = self.hub.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            while let Some(raw) = outbound.recv().await {
                hub.route(&id, &raw);
            }
        });

        Ok(link)
    }
}

/// A joined session together with its fakes
pub struct Participant {
    pub session: Session,
    pub connector: Arc<FakeConnector>,
    pub renderer: Arc<RecordingRenderer>,
}

impl Participant {
    pub async fn join(
        id: &str,
        connector: FakeConnector,
        relay: Arc<dyn RelayConnector>,
    ) -> Participant {
        let connector = Arc::new(connector);
        let renderer = Arc::new(RecordingRenderer::default());
        let deps = SessionDeps {
            media: Arc::new(FakeMedia),
            connector: connector.clone(),
            renderer: renderer.clone(),
            relay,
        };
        let config = Config::new("room.test", id.into());
        let session = Session::join(&config, deps, &MediaConstraints::default())
            .await
            .unwrap();

        Participant {
            session,
            connector,
            renderer,
        }
    }

    pub async fn join_hub(hub: &Arc<FakeRelayHub>, id: &str, connector: FakeConnector) -> Participant {
        Self::join(id, connector, Arc::new(hub.connector(id))).await
    }
}

/// Run every session until it stops or the runtime goes idle for `SETTLE`.
/// Returns the outcome of each session that stopped.
pub async fn drive(sessions: Vec<&mut Session>) -> Vec<Option<Result<(), SessionError>>> {
    let runs = sessions
        .into_iter()
        .map(|session| async move { tokio::time::timeout(SETTLE, session.run()).await.ok() });
    join_all(runs).await
}

/// Encode a message for injection through a manual relay
pub fn wire(message: SignalingMessage) -> String {
    encode(&message).unwrap()
}

pub fn users(from: &str, ids: &[&str]) -> String {
    wire(SignalingMessage::Users {
        from: from.into(),
        users: ids.iter().map(|id| PeerId::from(*id)).collect(),
    })
}

pub fn offer(from: &str, to: &str) -> String {
    wire(SignalingMessage::Offer {
        from: from.into(),
        to: to.into(),
        offer: SessionDescription::new(offer_blob(from, to)),
    })
}

pub fn answer(from: &str, to: &str) -> String {
    wire(SignalingMessage::Answer {
        from: from.into(),
        to: to.into(),
        answer: SessionDescription::new(answer_blob(from, to)),
    })
}

pub fn candidate(from: &str, to: &str, n: u32) -> String {
    wire(SignalingMessage::IceCandidate {
        from: from.into(),
        to: to.into(),
        candidate: Candidate::new(candidate_blob(from, to, n)),
    })
}

/// Drain everything a manual relay has received so far
pub fn outbound(ends: &mut RelayEnds) -> Vec<SignalingMessage> {
    let mut messages = Vec::new();
    while let Ok(raw) = ends.outbound.try_recv() {
        messages.push(decode(&raw).unwrap());
    }
    messages
}

/// Remote identities per message kind, for quick assertions
pub fn recipients(messages: &[SignalingMessage], kind: &str) -> Vec<PeerId> {
    messages
        .iter()
        .filter(|message| message.kind() == kind)
        .filter_map(|message| message.recipient().cloned())
        .collect()
}
