//! Reliable delivery sub-channel layered over the unreliable snapshot
//! stream.

use std::collections::HashMap;

use super::types::{EventId, GameEvent};
use crate::match_::PlayerId;

#[derive(Debug, Clone)]
pub struct PendingReliableEvent {
    pub event_id: EventId,
    pub event: GameEvent,
    pub first_sent_tick: u64,
    pub next_resend_tick: u64,
    pub attempts: u32,
}

/// Per-recipient queue of events that must be delivered at least once.
/// `eventId` is assigned once per event and shared across every recipient it
/// is enqueued for, so acks/ids stay comparable across viewers.
pub struct ReliableEventQueue {
    next_id: u64,
    per_player: HashMap<PlayerId, Vec<PendingReliableEvent>>,
    initial_resend_ticks: u64,
    backoff_factor: f32,
    cap_ticks: u64,
    max_attempts: u32,
}

impl ReliableEventQueue {
    pub fn new(initial_resend_ticks: u64, backoff_factor: f32, cap_ticks: u64, max_attempts: u32) -> Self {
        Self {
            next_id: 0,
            per_player: HashMap::new(),
            initial_resend_ticks: initial_resend_ticks.max(1),
            backoff_factor: backoff_factor.max(1.0),
            cap_ticks: cap_ticks.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Assigns a fresh event id and enqueues `event` for every recipient.
    pub fn enqueue_broadcast(
        &mut self,
        event: GameEvent,
        recipients: impl IntoIterator<Item = PlayerId>,
        tick: u64,
    ) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        for player in recipients {
            self.per_player.entry(player).or_default().push(PendingReliableEvent {
                event_id: id,
                event: event.clone(),
                first_sent_tick: tick,
                next_resend_tick: tick,
                attempts: 0,
            });
        }
        id
    }

    /// Every event whose `nextResendTick <= T` is due this broadcast. Returns
    /// the events to include plus the highest event id among them (for
    /// `StateUpdate.lastEventId`).
    pub fn due_for_broadcast(&mut self, player: PlayerId, tick: u64) -> (Vec<GameEvent>, Option<EventId>) {
        let Some(queue) = self.per_player.get_mut(&player) else {
            return (Vec::new(), None);
        };

        let mut out = Vec::new();
        let mut max_id: Option<EventId> = None;

        for pending in queue.iter_mut() {
            if pending.next_resend_tick > tick {
                continue;
            }
            out.push(pending.event.clone());
            max_id = Some(max_id.map_or(pending.event_id, |m| m.max(pending.event_id)));
            pending.attempts += 1;

            let backoff = self.initial_resend_ticks as f32 * self.backoff_factor.powi(pending.attempts as i32 - 1);
            let backoff = (backoff as u64).max(1).min(self.cap_ticks);
            pending.next_resend_tick = tick + backoff;
        }

        let max_attempts = self.max_attempts;
        queue.retain(|p| {
            let keep = p.attempts < max_attempts;
            if !keep {
                log::warn!(
                    "reliable event {:?} dropped for player {:?} after {} attempts",
                    p.event_id,
                    player,
                    p.attempts
                );
            }
            keep
        });

        (out, max_id)
    }

    /// Acks are monotonic per recipient; drops every event with
    /// `eventId <= lastEventId`.
    pub fn ack(&mut self, player: PlayerId, last_event_id: EventId) {
        if let Some(queue) = self.per_player.get_mut(&player) {
            queue.retain(|p| p.event_id > last_event_id);
        }
    }

    pub fn on_disconnect(&mut self, player: PlayerId) {
        self.per_player.remove(&player);
    }

    pub fn pending_count(&self, player: PlayerId) -> usize {
        self.per_player.get(&player).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, Side};

    fn tower_destroyed() -> GameEvent {
        GameEvent::TowerDestroyed { tower: EntityId(1), side: Side::A }
    }

    #[test]
    fn resends_with_geometric_backoff_until_acked() {
        let mut q = ReliableEventQueue::new(10, 2.0, 1000, 10);
        let id = q.enqueue_broadcast(tower_destroyed(), [PlayerId(1)], 100);

        let (events, max_id) = q.due_for_broadcast(PlayerId(1), 100);
        assert_eq!(events.len(), 1);
        assert_eq!(max_id, Some(id));

        // Not due again immediately.
        let (events, _) = q.due_for_broadcast(PlayerId(1), 105);
        assert!(events.is_empty());

        // Due again once the backoff window (10 ticks) elapses.
        let (events, _) = q.due_for_broadcast(PlayerId(1), 110);
        assert_eq!(events.len(), 1);

        q.ack(PlayerId(1), id);
        let (events, _) = q.due_for_broadcast(PlayerId(1), 500);
        assert!(events.is_empty());
    }

    #[test]
    fn drops_after_max_attempts() {
        let mut q = ReliableEventQueue::new(1, 1.0, 10, 3);
        q.enqueue_broadcast(tower_destroyed(), [PlayerId(1)], 0);

        for tick in [0, 1, 2, 3, 4] {
            q.due_for_broadcast(PlayerId(1), tick);
        }

        assert_eq!(q.pending_count(PlayerId(1)), 0);
    }

    #[test]
    fn shared_event_id_across_recipients() {
        let mut q = ReliableEventQueue::new(10, 2.0, 1000, 10);
        let id = q.enqueue_broadcast(tower_destroyed(), [PlayerId(1), PlayerId(2)], 0);

        let (_, id_a) = q.due_for_broadcast(PlayerId(1), 0);
        let (_, id_b) = q.due_for_broadcast(PlayerId(2), 0);
        assert_eq!(id_a, Some(id));
        assert_eq!(id_b, Some(id));
    }
}
