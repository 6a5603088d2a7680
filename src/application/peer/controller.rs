/// Peer connection controller
///
/// Drives one remote participant's connection through offer/answer
/// negotiation, gates connectivity candidates on the remote description and
/// exposes the remote stream exactly once when the transport connects.
use crate::domain::connection::{ConnectionEvent, RtcConnection, TransportState};
use crate::domain::media::{MediaBundle, RemoteStream, StreamRenderer};
use crate::domain::negotiation::{NegotiationState, Role};
use crate::domain::shared::{Candidate, NegotiationError, PeerId, SessionDescription};
use crate::infrastructure::signaling::{Outgoing, Signaller};
use crate::interface::metrics;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct PeerController {
    peer: PeerId,
    role: Option<Role>,
    state: NegotiationState,
    state_tx: watch::Sender<NegotiationState>,
    connection: Arc<dyn RtcConnection>,
    media: Arc<MediaBundle>,
    signaller: Signaller,
    renderer: Arc<dyn StreamRenderer>,
    /// Ids of local tracks attached to the connection
    attached: Vec<String>,
    remote_stream: RemoteStream,
    /// Candidates waiting for the remote description, in arrival order
    pending: VecDeque<Candidate>,
    media_ready: bool,
    created_at: Instant,
}

impl PeerController {
    pub fn new(
        peer: PeerId,
        connection: Arc<dyn RtcConnection>,
        media: Arc<MediaBundle>,
        signaller: Signaller,
        renderer: Arc<dyn StreamRenderer>,
        state_tx: watch::Sender<NegotiationState>,
    ) -> Self {
        state_tx.send_replace(NegotiationState::New);
        Self {
            peer,
            role: None,
            state: NegotiationState::New,
            state_tx,
            connection,
            media,
            signaller,
            renderer,
            attached: Vec::new(),
            remote_stream: RemoteStream::new(),
            pending: VecDeque::new(),
            media_ready: false,
            created_at: Instant::now(),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn role(&self) -> Option<Role> {
        self.role
    }

    #[cfg(test)]
    pub(crate) fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub(crate) fn attached_tracks(&self) -> &[String] {
        &self.attached
    }

    #[cfg(test)]
    pub(crate) fn remote_stream(&self) -> &RemoteStream {
        &self.remote_stream
    }

    #[cfg(test)]
    pub(crate) fn is_media_ready(&self) -> bool {
        self.media_ready
    }

    /// Our offer is outstanding, so a remote offer now is a collision
    pub fn has_offer_collision(&self) -> bool {
        self.state == NegotiationState::HaveLocalOffer
    }

    /// Tie-break for colliding offers: the higher identity keeps its offer
    /// and the lower one answers
    pub fn keeps_own_offer(&self) -> bool {
        self.signaller.local_id() > &self.peer
    }

    /// Drop the connection that carried our abandoned offer and start over
    /// in `New` on `connection`. Queued remote candidates are kept.
    pub async fn replace_connection(&mut self, connection: Arc<dyn RtcConnection>) {
        metrics::record_offer_collision();
        if let Err(e) = self.connection.close().await {
            warn!("Error closing abandoned connection to {}: {}", self.peer, e);
        }

        self.connection = connection;
        self.role = None;
        self.attached.clear();
        self.remote_stream = RemoteStream::new();
        self.state = NegotiationState::New;
        self.state_tx.send_replace(NegotiationState::New);
        debug!(
            "Replaced connection to {}, {} candidates still queued",
            self.peer,
            self.pending.len()
        );
    }

    /// Offerer path: attach media, set and send the local offer
    pub async fn create_offer(&mut self) -> Result<(), NegotiationError> {
        self.require(NegotiationState::New, "create offer")?;
        self.role = Some(Role::Offerer);

        self.attach_local_media().await?;
        let offer = self.connection.create_offer().await?;
        self.connection.set_local_description(offer.clone()).await?;
        self.transition(NegotiationState::HaveLocalOffer)?;

        info!("Sending offer to {}", self.peer);
        self.emit(Outgoing::Offer {
            to: self.peer.clone(),
            offer,
        });
        Ok(())
    }

    /// Answerer path: apply the remote offer, set and send the local answer
    pub async fn on_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        self.require(NegotiationState::New, "apply remote offer")?;
        self.role = Some(Role::Answerer);

        self.attach_local_media().await?;
        self.connection.set_remote_description(offer).await?;
        self.transition(NegotiationState::HaveRemoteOffer)?;
        self.flush_pending().await?;

        let answer = self.connection.create_answer().await?;
        self.connection.set_local_description(answer.clone()).await?;
        self.transition(NegotiationState::Negotiating)?;

        info!("Sending answer to {}", self.peer);
        self.emit(Outgoing::Answer {
            to: self.peer.clone(),
            answer,
        });
        Ok(())
    }

    /// Apply the answer to our offer. Repeated answers are ignored.
    pub async fn on_answer(&mut self, answer: SessionDescription) -> Result<(), NegotiationError> {
        match self.state {
            NegotiationState::HaveLocalOffer => {
                self.connection.set_remote_description(answer).await?;
                self.transition(NegotiationState::Negotiating)?;
                self.flush_pending().await?;
                debug!("Applied answer from {}", self.peer);
                Ok(())
            }
            NegotiationState::Negotiating | NegotiationState::Connected
                if self.role == Some(Role::Offerer) =>
            {
                warn!("Ignoring duplicate answer from {}", self.peer);
                Ok(())
            }
            NegotiationState::Closed => {
                debug!("Ignoring answer from {} after close", self.peer);
                Ok(())
            }
            state => Err(NegotiationError::InvalidStateTransition {
                state,
                operation: "apply remote answer",
            }),
        }
    }

    /// Apply a remote candidate now, or hold it until the remote description is set
    pub async fn on_candidate(&mut self, candidate: Candidate) -> Result<(), NegotiationError> {
        if self.state.is_closed() {
            debug!("Discarding candidate from {} after close", self.peer);
            return Ok(());
        }

        if self.state.has_remote_description() {
            self.connection.add_ice_candidate(candidate).await
        } else {
            self.pending.push_back(candidate);
            debug!(
                "Queued candidate from {} ({} pending)",
                self.peer,
                self.pending.len()
            );
            Ok(())
        }
    }

    /// React to a notification from the underlying connection
    pub async fn on_connection_event(&mut self, event: ConnectionEvent) {
        if self.state.is_closed() {
            return;
        }

        match event {
            ConnectionEvent::LocalCandidate(Some(candidate)) => {
                self.emit(Outgoing::IceCandidate {
                    to: self.peer.clone(),
                    candidate,
                });
            }
            ConnectionEvent::LocalCandidate(None) => {
                debug!("Candidate gathering complete for {}", self.peer);
            }
            ConnectionEvent::TrackAdded(track) => {
                debug!("Remote {} track {} from {}", track.kind, track.id, self.peer);
                self.remote_stream.add_track(track);
            }
            ConnectionEvent::StateChanged(state) => self.on_transport_state(state).await,
        }
    }

    async fn on_transport_state(&mut self, state: TransportState) {
        match state {
            TransportState::Connected => match self.state {
                NegotiationState::Negotiating => {
                    if self.transition(NegotiationState::Connected).is_ok() {
                        info!("Connected to {}", self.peer);
                        self.mark_media_ready();
                    }
                }
                NegotiationState::Connected => {
                    debug!("Repeated connected notification from {}", self.peer);
                }
                other => {
                    warn!(
                        "Transport for {} connected while negotiation is {}",
                        self.peer, other
                    );
                }
            },
            state if state.is_terminal() => {
                info!("Transport for {} ended ({:?})", self.peer, state);
                self.close().await;
            }
            state => {
                debug!("Transport for {} is {:?}", self.peer, state);
            }
        }
    }

    /// Log a negotiation failure and close
    pub async fn fail(&mut self, err: NegotiationError) {
        error!("Negotiation with {} failed: {}", self.peer, err);
        metrics::record_negotiation_failed();
        self.close().await;
    }

    /// Terminal: discards queued candidates and closes the connection
    pub async fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }

        self.state = NegotiationState::Closed;
        self.state_tx.send_replace(NegotiationState::Closed);
        self.pending.clear();

        if let Err(e) = self.connection.close().await {
            warn!("Error closing connection to {}: {}", self.peer, e);
        }
        info!("Closed peer controller for {}", self.peer);
    }

    async fn attach_local_media(&mut self) -> Result<(), NegotiationError> {
        for track in self.media.tracks() {
            if self.attached.iter().any(|id| id == track.id()) {
                continue;
            }
            self.connection.add_track(track).await?;
            self.attached.push(track.id().to_string());
        }
        debug!("Attached {} local tracks for {}", self.attached.len(), self.peer);
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<(), NegotiationError> {
        if !self.pending.is_empty() {
            debug!(
                "Applying {} queued candidates from {}",
                self.pending.len(),
                self.peer
            );
        }
        while let Some(candidate) = self.pending.pop_front() {
            self.connection.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    fn mark_media_ready(&mut self) {
        if self.media_ready {
            return;
        }
        self.media_ready = true;
        metrics::record_media_ready(self.created_at.elapsed());
        self.renderer
            .on_remote_stream_ready(&self.peer, self.remote_stream.clone());
    }

    fn require(
        &self,
        expected: NegotiationState,
        operation: &'static str,
    ) -> Result<(), NegotiationError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(NegotiationError::InvalidStateTransition {
                state: self.state,
                operation,
            })
        }
    }

    fn transition(&mut self, next: NegotiationState) -> Result<(), NegotiationError> {
        if !self.state.can_transition_to(next) {
            return Err(NegotiationError::InvalidStateTransition {
                state: self.state,
                operation: "transition",
            });
        }
        debug!("Peer {} {} -> {}", self.peer, self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);
        Ok(())
    }

    fn emit(&self, message: Outgoing) {
        if let Err(e) = self.signaller.send(message) {
            debug!("Dropping message for {}: {}", self.peer, e);
        }
    }
}
