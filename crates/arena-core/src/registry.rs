//! Process-wide `playerId -> Match` lookup. The only state shared across
//! match workers — everything else inside a `Match` is owned exclusively by
//! that match's own thread. A plain read-mostly map, not a lobby/queue
//! system.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;

use crate::match_::{InboundMessage, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchId(pub u64);

/// What the registry hands back for a connected player: which match they're
/// in, and the channel a host thread uses to hand that match's worker an
/// inbound message. Cheap to clone — it's just an id and a channel handle.
#[derive(Clone)]
pub struct MatchHandle {
    pub match_id: MatchId,
    pub inbound: Sender<InboundMessage>,
}

/// Concurrent, read-mostly map from player to match. Reads (routing an
/// inbound packet) vastly outnumber writes (a player joining or leaving a
/// match), so a `parking_lot::RwLock` over a plain `HashMap` is the right
/// shape rather than a sharded or lock-free map.
#[derive(Default)]
pub struct MatchRegistry {
    players: RwLock<HashMap<PlayerId, MatchHandle>>,
}

impl MatchRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Associates a player with a match. Overwrites any previous entry —
    /// callers are expected to `unregister` on disconnect, but a stale
    /// mapping left behind by a crashed worker should not wedge rejoining.
    pub fn register(&self, player: PlayerId, handle: MatchHandle) {
        self.players.write().insert(player, handle);
    }

    pub fn unregister(&self, player: PlayerId) {
        self.players.write().remove(&player);
    }

    /// Routes an inbound message to the player's match. Returns `false` if
    /// the player isn't registered, or the match's worker has hung up.
    pub fn route(&self, player: PlayerId, message: InboundMessage) -> bool {
        let guard = self.players.read();
        match guard.get(&player) {
            Some(handle) => handle.inbound.send(message).is_ok(),
            None => false,
        }
    }

    pub fn handle_for(&self, player: PlayerId) -> Option<MatchHandle> {
        self.players.read().get(&player).cloned()
    }

    pub fn player_count(&self) -> usize {
        self.players.read().len()
    }

    /// Drops every player mapped to `match_id`. Called once a match's
    /// worker thread exits so the registry doesn't hold dangling senders.
    pub fn retire_match(&self, match_id: MatchId) {
        self.players.write().retain(|_, handle| handle.match_id != match_id);
    }
}
