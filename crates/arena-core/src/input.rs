//! Per-player input pipeline: ordering, validation hand-off, rate limiting,
//! and ack tracking.

use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize};

use crate::entity::EntityId;
use crate::match_::PlayerId;

/// The ten typed command payloads a player can send. `seq`/`clientTime` live
/// on the envelope rather than per-variant.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ClientInput {
    Move { target: Vec2 },
    AttackMove { target: Vec2 },
    TargetUnit { target: EntityId },
    Stop,
    CastAbility { slot: u8, target: Option<EntityId>, target_point: Option<Vec2> },
    LevelUp { slot: u8 },
    BuyItem { item_id: u32 },
    SellItem { slot: u8 },
    Recall,
    Ping { position: Vec2 },
    PlaceWard { position: Vec2, ward_kind: u8 },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct InputEnvelope {
    pub seq: u32,
    pub client_time: u64,
    pub payload: ClientInput,
}

struct PlayerQueue {
    /// Out-of-order arrivals, keyed by seq, waiting for the gap to close.
    pending: BTreeMap<u32, (InputEnvelope, u64)>,
    last_applied_seq: u32,
    rate_window_start_tick: u64,
    rate_window_count: u32,
}

impl PlayerQueue {
    fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            last_applied_seq: 0,
            rate_window_start_tick: 0,
            rate_window_count: 0,
        }
    }
}

/// Per-player ordered input queues. Validation proper (targeting,
/// cooldowns, navigability) is a `RulesCatalogue` concern — this pipeline
/// only guarantees ordering, dedup of stale input, rate limiting, and acks.
pub struct InputPipeline {
    queues: HashMap<PlayerId, PlayerQueue>,
    rate_limit_per_sec: u32,
    tick_rate: u32,
    reorder_window_ticks: u64,
}

impl InputPipeline {
    pub fn new(rate_limit_per_sec: u32, tick_rate: u32, reorder_window_ticks: u64) -> Self {
        Self {
            queues: HashMap::new(),
            rate_limit_per_sec,
            tick_rate,
            reorder_window_ticks,
        }
    }

    /// Enqueues an inbound input. Returns `false` if it was dropped (stale or
    /// rate-limited) without ever touching the simulation.
    pub fn enqueue(&mut self, player: PlayerId, input: InputEnvelope, tick: u64) -> bool {
        let queue = self.queues.entry(player).or_insert_with(PlayerQueue::new);

        if tick.saturating_sub(queue.rate_window_start_tick) >= self.tick_rate as u64 {
            queue.rate_window_start_tick = tick;
            queue.rate_window_count = 0;
        }
        if queue.rate_window_count >= self.rate_limit_per_sec {
            log::debug!("dropping input from player {:?}: rate limit exceeded", player);
            return false;
        }

        if input.seq <= queue.last_applied_seq {
            log::debug!(
                "dropping stale input seq={} from player {:?} (last applied {})",
                input.seq,
                player,
                queue.last_applied_seq
            );
            return false;
        }

        queue.rate_window_count += 1;
        queue.pending.insert(input.seq, (input, tick));
        true
    }

    /// Releases every input now ready to apply, in `seq` order: a
    /// contiguous run starting at `last_applied_seq + 1`, or — once the
    /// reorder window elapses on the oldest buffered gap — skipping forward
    /// past the missing seq and releasing whatever contiguous run follows.
    pub fn drain_ready(&mut self, player: PlayerId, tick: u64) -> Vec<InputEnvelope> {
        let Some(queue) = self.queues.get_mut(&player) else {
            return Vec::new();
        };

        if let Some((&oldest_seq, &(_, arrival_tick))) = queue.pending.iter().next() {
            let expected = queue.last_applied_seq.wrapping_add(1);
            if oldest_seq != expected && tick.saturating_sub(arrival_tick) >= self.reorder_window_ticks {
                queue.last_applied_seq = oldest_seq.wrapping_sub(1);
            }
        }

        let mut out = Vec::new();
        loop {
            let expected = queue.last_applied_seq.wrapping_add(1);
            match queue.pending.remove(&expected) {
                Some((envelope, _)) => {
                    queue.last_applied_seq = expected;
                    out.push(envelope);
                }
                None => break,
            }
        }
        out
    }

    pub fn last_applied_seq(&self, player: PlayerId) -> u32 {
        self.queues.get(&player).map_or(0, |q| q.last_applied_seq)
    }

    /// Ack map attached to every outgoing `StateUpdate`.
    pub fn ack_map(&self) -> Vec<(PlayerId, u32)> {
        self.queues.iter().map(|(p, q)| (*p, q.last_applied_seq)).collect()
    }

    pub fn remove_player(&mut self, player: PlayerId) {
        self.queues.remove(&player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(seq: u32) -> InputEnvelope {
        InputEnvelope { seq, client_time: 0, payload: ClientInput::Stop }
    }

    #[test]
    fn in_order_inputs_release_immediately() {
        let mut pipeline = InputPipeline::new(60, 125, 50);
        pipeline.enqueue(PlayerId(1), env(1), 0);
        let ready = pipeline.drain_ready(PlayerId(1), 0);
        assert_eq!(ready.len(), 1);
        assert_eq!(pipeline.last_applied_seq(PlayerId(1)), 1);
    }

    #[test]
    fn seq_equal_to_last_applied_is_dropped() {
        let mut pipeline = InputPipeline::new(60, 125, 50);
        pipeline.enqueue(PlayerId(1), env(1), 0);
        pipeline.drain_ready(PlayerId(1), 0);

        assert!(!pipeline.enqueue(PlayerId(1), env(1), 1));
        assert!(pipeline.enqueue(PlayerId(1), env(2), 1));
    }

    #[test]
    fn out_of_order_buffers_until_gap_closes() {
        let mut pipeline = InputPipeline::new(60, 125, 50);
        pipeline.enqueue(PlayerId(1), env(2), 0);
        assert!(pipeline.drain_ready(PlayerId(1), 0).is_empty());

        pipeline.enqueue(PlayerId(1), env(1), 1);
        let ready = pipeline.drain_ready(PlayerId(1), 1);
        assert_eq!(ready.len(), 2);
        assert_eq!(pipeline.last_applied_seq(PlayerId(1)), 2);
    }

    #[test]
    fn gap_skipped_once_reorder_window_elapses() {
        let mut pipeline = InputPipeline::new(60, 125, 5);
        pipeline.enqueue(PlayerId(1), env(3), 0);
        assert!(pipeline.drain_ready(PlayerId(1), 0).is_empty());
        assert!(pipeline.drain_ready(PlayerId(1), 4).is_empty());

        let ready = pipeline.drain_ready(PlayerId(1), 5);
        assert_eq!(ready.len(), 1);
        assert_eq!(pipeline.last_applied_seq(PlayerId(1)), 3);
    }

    #[test]
    fn rate_limit_drops_overflow() {
        let mut pipeline = InputPipeline::new(2, 125, 50);
        assert!(pipeline.enqueue(PlayerId(1), env(1), 0));
        assert!(pipeline.enqueue(PlayerId(1), env(2), 0));
        assert!(!pipeline.enqueue(PlayerId(1), env(3), 0));
    }
}
