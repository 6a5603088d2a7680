//! Session orchestrator
//!
//! Owns the peer registry for one room. Inbound relay messages are decoded
//! and dispatched one at a time from `run`; every registry mutation happens
//! on that path, so there is never more than one controller per identity.

use crate::application::peer::{PeerCommand, PeerExit, RoomContext};
use crate::application::registry::PeerRegistry;
use crate::config::Config;
use crate::domain::connection::RtcConnector;
use crate::domain::media::{MediaConstraints, MediaSource, StreamRenderer};
use crate::domain::negotiation::{NegotiationState, Role};
use crate::domain::shared::{Candidate, PeerId, SessionDescription, SessionError};
use crate::infrastructure::relay::{RelayConnector, RelayLink};
use crate::infrastructure::signaling::{decode, Outgoing, SignalingMessage, Signaller};
use crate::interface::metrics;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Most candidates held for one identity without a controller
const MAX_HELD_PER_PEER: usize = 32;
/// Most identities with held candidates at once
const MAX_HELD_PEERS: usize = 64;

/// External collaborators a session is built from
#[derive(Clone)]
pub struct SessionDeps {
    pub media: Arc<dyn MediaSource>,
    pub connector: Arc<dyn RtcConnector>,
    pub renderer: Arc<dyn StreamRenderer>,
    pub relay: Arc<dyn RelayConnector>,
}

pub struct Session {
    id: Uuid,
    local: PeerId,
    registry: PeerRegistry,
    signaller: Signaller,
    /// Candidates from identities that have no controller yet
    orphans: HashMap<PeerId, Vec<Candidate>>,
    /// Identities whose controller went away; their stray candidates are
    /// discarded until a new controller is created for them
    departed: HashSet<PeerId>,
    inbound: mpsc::UnboundedReceiver<String>,
    exits: mpsc::UnboundedReceiver<PeerExit>,
    terminated: bool,
}

impl Session {
    /// Acquire local media, open the relay channel and announce ourselves.
    ///
    /// Returns as soon as the `connected` broadcast is written; negotiation
    /// with other participants happens while `run` is driven.
    pub async fn join(
        config: &Config,
        deps: SessionDeps,
        constraints: &MediaConstraints,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let local = config.identity.clone();
        info!(session_id = %id, "Joining {} as {}", config.domain, local);

        let media = deps.media.acquire(constraints).await?;
        info!("Acquired {} local tracks", media.len());

        let url = config.relay_url();
        let RelayLink { outbound, inbound } = deps.relay.open(&url).await?;
        info!("Relay channel open at {}", url);

        let signaller = Signaller::new(local.clone(), outbound);
        let (exits_tx, exits) = mpsc::unbounded_channel();
        let context = RoomContext {
            connector: deps.connector,
            media: Arc::new(media),
            signaller: signaller.clone(),
            renderer: deps.renderer,
            exits: exits_tx,
        };

        signaller.send(Outgoing::Connected)?;

        Ok(Self {
            id,
            local,
            registry: PeerRegistry::new(context),
            signaller,
            orphans: HashMap::new(),
            departed: HashSet::new(),
            inbound,
            exits,
            terminated: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local
    }

    /// Registered remote identities, sorted
    pub fn peers(&self) -> Vec<PeerId> {
        self.registry.ids()
    }

    pub fn peer_state(&self, peer: &PeerId) -> Option<NegotiationState> {
        self.registry.get(peer).map(|handle| handle.state())
    }

    pub fn watch_peer(&self, peer: &PeerId) -> Option<watch::Receiver<NegotiationState>> {
        self.registry.get(peer).map(|handle| handle.watch_state())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Process relay messages until the channel closes.
    ///
    /// The closed channel is reported as `ChannelClosed` once; later calls
    /// return `Ok(())` immediately.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        if self.terminated {
            return Ok(());
        }

        let span = info_span!("session", session_id = %self.id, local = %self.local);
        self.process().instrument(span).await
    }

    async fn process(&mut self) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                raw = self.inbound.recv() => match raw {
                    Some(raw) => self.on_message(&raw),
                    None => {
                        warn!("Relay channel closed, session terminated");
                        self.signaller.close();
                        self.terminated = true;
                        return Err(SessionError::ChannelClosed);
                    }
                },
                Some(exit) = self.exits.recv() => self.on_peer_exit(exit),
            }
        }
    }

    /// Decode and dispatch one relay message. Malformed input is dropped.
    pub fn on_message(&mut self, raw: &str) {
        let message = match decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping signaling message: {}", e);
                metrics::record_dropped();
                return;
            }
        };
        metrics::record_received(message.kind());

        if *message.sender() == self.local {
            debug!("Ignoring own {} message", message.kind());
            return;
        }
        if let Some(to) = message.recipient() {
            if *to != self.local {
                debug!("Ignoring {} addressed to {}", message.kind(), to);
                return;
            }
        }

        match message {
            SignalingMessage::Connected { from, .. } => {
                info!("{} joined the room", from);
            }
            SignalingMessage::Users { users, .. } => self.on_roster(users),
            SignalingMessage::Offer { from, offer, .. } => self.on_offer(from, offer),
            SignalingMessage::Answer { from, answer, .. } => self.on_answer(from, answer),
            SignalingMessage::IceCandidate {
                from, candidate, ..
            } => self.on_candidate(from, candidate),
        }
    }

    fn on_roster(&mut self, users: Vec<PeerId>) {
        debug!("Roster with {} participants", users.len());
        for peer in users {
            if peer == self.local || peer.is_empty() {
                continue;
            }
            self.ensure_peer(&peer, Role::Offerer);
        }
    }

    fn on_offer(&mut self, from: PeerId, offer: SessionDescription) {
        self.ensure_peer(&from, Role::Answerer);
        self.forward(&from, PeerCommand::Offer(offer));
    }

    fn on_answer(&mut self, from: PeerId, answer: SessionDescription) {
        if self.registry.contains(&from) {
            self.forward(&from, PeerCommand::Answer(answer));
        } else {
            warn!("Dropping answer from unknown peer {}", from);
        }
    }

    fn on_candidate(&mut self, from: PeerId, candidate: Candidate) {
        if self.registry.contains(&from) {
            self.forward(&from, PeerCommand::Candidate(candidate));
            return;
        }

        if self.departed.contains(&from) {
            debug!("Discarding candidate from departed peer {}", from);
            return;
        }
        if !self.orphans.contains_key(&from) && self.orphans.len() >= MAX_HELD_PEERS {
            warn!("Too many unknown senders, discarding candidate from {}", from);
            return;
        }

        let queued = self.orphans.entry(from.clone()).or_default();
        if queued.len() >= MAX_HELD_PER_PEER {
            warn!("Candidate queue for {} is full, discarding", from);
            return;
        }
        queued.push(candidate);
        debug!("Holding candidate from {} ({} held)", from, queued.len());
    }

    /// Make sure a live controller exists for `peer`, handing it any
    /// candidates that arrived before it did
    fn ensure_peer(&mut self, peer: &PeerId, role: Role) {
        let (handle, created) = self.registry.get_or_create(peer, role);
        if !created {
            return;
        }

        info!("Created {} controller for {}", role, peer);
        self.departed.remove(peer);
        if let Some(queued) = self.orphans.remove(peer) {
            debug!("Delivering {} held candidates to {}", queued.len(), peer);
            for candidate in queued {
                let _ = handle.send(PeerCommand::Candidate(candidate));
            }
        }
        metrics::update_active_peers(self.registry.len());
    }

    fn forward(&self, peer: &PeerId, command: PeerCommand) {
        let Some(handle) = self.registry.get(peer) else {
            return;
        };
        if handle.is_closed() || handle.send(command).is_err() {
            debug!("Controller for {} is closed, discarding signal", peer);
        }
    }

    fn on_peer_exit(&mut self, exit: PeerExit) {
        if self
            .registry
            .remove_if_generation(&exit.peer, exit.generation)
            .is_some()
        {
            info!("Unregistered controller for {}", exit.peer);
            self.orphans.remove(&exit.peer);
            self.departed.insert(exit.peer);
            metrics::update_active_peers(self.registry.len());
        }
    }

    /// Close and unregister the controller for a departed participant
    pub async fn remove_peer(&mut self, peer: &PeerId) {
        self.orphans.remove(peer);
        if let Some(handle) = self.registry.remove(peer) {
            info!("Removing {} from the room", peer);
            self.departed.insert(peer.clone());
            handle.close().await;
            metrics::update_active_peers(self.registry.len());
        }
    }

    /// Close every controller and stop writing to the relay
    pub async fn leave(&mut self) {
        let handles = self.registry.drain();
        info!("Leaving room, closing {} peers", handles.len());
        join_all(handles.into_iter().map(|handle| handle.close())).await;
        self.orphans.clear();
        self.departed.clear();
        self.signaller.close();
        metrics::update_active_peers(0);
    }
}
