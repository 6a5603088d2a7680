//! Per-peer actor task
//!
//! Each remote participant gets one task that owns its `PeerController`.
//! Relay-delivered signals arrive as `PeerCommand`s; connection
//! notifications arrive on the connection's event channel. The task is the
//! only place the controller is touched, so operations on one peer never
//! interleave.

use super::controller::PeerController;
use crate::domain::connection::{ConnectionEvents, RtcConnector};
use crate::domain::media::{MediaBundle, StreamRenderer};
use crate::domain::negotiation::{NegotiationState, Role};
use crate::domain::shared::{Candidate, PeerId, SessionDescription, SessionError};
use crate::infrastructure::signaling::Signaller;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

#[derive(Debug, Clone)]
pub enum PeerCommand {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(Candidate),
    Close,
}

/// Sent by a peer task when it stops, for whatever reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerExit {
    pub peer: PeerId,
    pub generation: u64,
}

/// Collaborators shared by every peer task in a session
#[derive(Clone)]
pub struct RoomContext {
    pub connector: Arc<dyn RtcConnector>,
    pub media: Arc<MediaBundle>,
    pub signaller: Signaller,
    pub renderer: Arc<dyn StreamRenderer>,
    pub exits: mpsc::UnboundedSender<PeerExit>,
}

/// Session-side handle to a running peer task
pub struct PeerHandle {
    peer: PeerId,
    generation: u64,
    commands: mpsc::UnboundedSender<PeerCommand>,
    state: watch::Receiver<NegotiationState>,
    task: JoinHandle<()>,
}

impl PeerHandle {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    /// Subscribe to negotiation state changes
    pub fn watch_state(&self) -> watch::Receiver<NegotiationState> {
        self.state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed() || self.commands.is_closed()
    }

    pub fn send(&self, command: PeerCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Close the controller and wait for its task to finish
    pub async fn close(self) {
        let _ = self.commands.send(PeerCommand::Close);
        if let Err(e) = self.task.await {
            error!("Peer task for {} ended abnormally: {}", self.peer, e);
        }
    }
}

/// Start the task for `peer`. For `Role::Offerer` the task sends an offer
/// as soon as the connection exists.
pub fn spawn_peer(ctx: RoomContext, peer: PeerId, generation: u64, role: Role) -> PeerHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(NegotiationState::New);

    let span = info_span!("peer", peer = %peer, generation);
    let task = tokio::spawn(
        run_peer(ctx, peer.clone(), generation, role, commands_rx, state_tx).instrument(span),
    );

    PeerHandle {
        peer,
        generation,
        commands: commands_tx,
        state: state_rx,
        task,
    }
}

async fn run_peer(
    ctx: RoomContext,
    peer: PeerId,
    generation: u64,
    role: Role,
    mut commands: mpsc::UnboundedReceiver<PeerCommand>,
    state_tx: watch::Sender<NegotiationState>,
) {
    let exit = PeerExit {
        peer: peer.clone(),
        generation,
    };

    let new = match ctx.connector.connect(&peer).await {
        Ok(new) => new,
        Err(e) => {
            error!("Failed to create connection for {}: {}", peer, e);
            state_tx.send_replace(NegotiationState::Closed);
            let _ = ctx.exits.send(exit);
            return;
        }
    };

    let mut events = new.events;
    let mut controller = PeerController::new(
        peer.clone(),
        new.connection,
        ctx.media.clone(),
        ctx.signaller.clone(),
        ctx.renderer.clone(),
        state_tx,
    );

    if role == Role::Offerer {
        if let Err(e) = controller.create_offer().await {
            controller.fail(e).await;
        }
    }

    let mut events_open = true;
    while !controller.state().is_closed() {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(PeerCommand::Close) | None => controller.close().await,
                    Some(PeerCommand::Offer(offer)) if controller.has_offer_collision() => {
                        if controller.keeps_own_offer() {
                            info!("Offer collision with {}, keeping our own offer", peer);
                        } else if let Some(fresh) =
                            answer_instead(&ctx, &mut controller, offer).await
                        {
                            events = fresh;
                            events_open = true;
                        }
                    }
                    Some(command) => handle_command(&mut controller, command).await,
                }
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(event) => controller.on_connection_event(event).await,
                    None => {
                        debug!("Connection event stream ended for {}", controller.peer());
                        events_open = false;
                    }
                }
            }
        }
    }

    debug!("Peer task for {} finished", peer);
    let _ = ctx.exits.send(exit);
}

/// Give up our outstanding offer and answer the remote one on a fresh
/// connection. Returns the new connection's event stream.
async fn answer_instead(
    ctx: &RoomContext,
    controller: &mut PeerController,
    offer: SessionDescription,
) -> Option<ConnectionEvents> {
    info!("Offer collision with {}, answering theirs", controller.peer());
    let new = match ctx.connector.connect(controller.peer()).await {
        Ok(new) => new,
        Err(e) => {
            controller.fail(e).await;
            return None;
        }
    };

    controller.replace_connection(new.connection).await;
    handle_command(controller, PeerCommand::Offer(offer)).await;
    Some(new.events)
}

async fn handle_command(controller: &mut PeerController, command: PeerCommand) {
    let result = match command {
        PeerCommand::Offer(offer) => controller.on_offer(offer).await,
        PeerCommand::Answer(answer) => controller.on_answer(answer).await,
        PeerCommand::Candidate(candidate) => controller.on_candidate(candidate).await,
        PeerCommand::Close => {
            controller.close().await;
            Ok(())
        }
    };

    if let Err(e) = result {
        controller.fail(e).await;
    }
}

