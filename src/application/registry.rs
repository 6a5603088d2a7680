//! Peer registry
//!
//! Maps remote identities to their running peer tasks. Holds at most one
//! live controller per identity; a handle whose controller has closed is
//! replaced on next use.

use crate::application::peer::{spawn_peer, PeerHandle, RoomContext};
use crate::domain::negotiation::Role;
use crate::domain::shared::PeerId;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerHandle>,
    context: RoomContext,
    next_generation: u64,
}

impl PeerRegistry {
    pub fn new(context: RoomContext) -> Self {
        Self {
            peers: HashMap::new(),
            context,
            next_generation: 0,
        }
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PeerHandle> {
        self.peers.get(peer)
    }

    /// Return the live handle for `peer`, spawning one in `role` if there is
    /// none. The flag is true when a new controller was created.
    pub fn get_or_create(&mut self, peer: &PeerId, role: Role) -> (&PeerHandle, bool) {
        let generation = self.next_generation;

        match self.peers.entry(peer.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    debug!("Replacing closed controller for {}", peer);
                    self.next_generation += 1;
                    entry.insert(spawn_peer(self.context.clone(), peer.clone(), generation, role));
                    (entry.into_mut(), true)
                } else {
                    (entry.into_mut(), false)
                }
            }
            Entry::Vacant(entry) => {
                self.next_generation += 1;
                let handle = spawn_peer(self.context.clone(), peer.clone(), generation, role);
                (entry.insert(handle), true)
            }
        }
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<PeerHandle> {
        self.peers.remove(peer)
    }

    /// Remove `peer` only if its handle is still `generation`
    pub fn remove_if_generation(&mut self, peer: &PeerId, generation: u64) -> Option<PeerHandle> {
        match self.peers.get(peer) {
            Some(handle) if handle.generation() == generation => self.peers.remove(peer),
            _ => None,
        }
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    pub(crate) fn len(&self) -> usize {
        self.peers.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn drain(&mut self) -> Vec<PeerHandle> {
        self.peers.drain().map(|(_, handle)| handle).collect()
    }
}
