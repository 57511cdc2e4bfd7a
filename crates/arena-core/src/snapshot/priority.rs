//! EntityPrioritizer: per-viewer update cadence by distance.

use std::collections::HashMap;

use glam::Vec2;

use crate::entity::EntityId;
use crate::match_::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The viewer's own entity; always eligible.
    Own,
    Near,
    Mid,
    Far,
}

impl Tier {
    fn cadence_ticks(self) -> u64 {
        match self {
            Tier::Own | Tier::Near => 1,
            Tier::Mid => 2,
            Tier::Far => 4,
        }
    }
}

/// Distance bands, configurable per match rather than hardcoded.
#[derive(Debug, Clone, Copy)]
pub struct PriorityConfig {
    pub near_radius: f32,
    pub mid_radius: f32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self { near_radius: 1000.0, mid_radius: 2500.0 }
    }
}

struct Schedule {
    next_eligible_tick: u64,
}

/// Tracks, per viewer, the next tick each entity becomes eligible for
/// inclusion in that viewer's `StateUpdate`. Critical changes bypass this
/// entirely at the call site (see [`SnapshotSerializer`](super::serializer)).
pub struct EntityPrioritizer {
    config: PriorityConfig,
    schedules: HashMap<(PlayerId, EntityId), Schedule>,
}

impl EntityPrioritizer {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config, schedules: HashMap::new() }
    }

    fn tier(&self, viewer_champion: EntityId, entity: EntityId, distance: f32) -> Tier {
        if entity == viewer_champion {
            Tier::Own
        } else if distance <= self.config.near_radius {
            Tier::Near
        } else if distance <= self.config.mid_radius {
            Tier::Mid
        } else {
            Tier::Far
        }
    }

    /// Whether `entity` is eligible for inclusion to `viewer` this tick,
    /// given its distance from `viewer`'s champion. Advances the schedule as
    /// a side effect when eligible.
    pub fn is_eligible(
        &mut self,
        viewer: PlayerId,
        viewer_champion: EntityId,
        entity: EntityId,
        champion_position: Vec2,
        entity_position: Vec2,
        tick: u64,
    ) -> bool {
        let distance = champion_position.distance(entity_position);
        let tier = self.tier(viewer_champion, entity, distance);

        let key = (viewer, entity);
        let eligible = self.schedules.get(&key).is_none_or(|s| tick >= s.next_eligible_tick);
        if eligible {
            self.schedules.insert(key, Schedule { next_eligible_tick: tick + tier.cadence_ticks() });
        }
        eligible
    }

    /// Forces `entity` eligible on `viewer`'s very next broadcast, regardless
    /// of tier — called when a critical change occurs.
    pub fn force_next_tick(&mut self, viewer: PlayerId, entity: EntityId, tick: u64) {
        self.schedules.insert((viewer, entity), Schedule { next_eligible_tick: tick });
    }

    pub fn remove_viewer(&mut self, viewer: PlayerId) {
        self.schedules.retain(|(v, _), _| *v != viewer);
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.schedules.retain(|(_, e), _| *e != entity);
    }
}
