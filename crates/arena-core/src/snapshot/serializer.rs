//! SnapshotSerializer: per-viewer delta compression, priority thinning, and
//! event attachment. The densest subsystem in the core.

use std::collections::HashMap;

use rkyv::{Archive, Deserialize, Serialize};

use crate::entity::{Baseline, Entity, EntityId, EntitySnapshot};
use crate::event::{EventId, GameEvent};
use crate::match_::PlayerId;
use crate::snapshot::change_mask::{self, ChangeMask};
use crate::snapshot::priority::EntityPrioritizer;

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityDelta {
    pub entity_id: EntityId,
    pub change_mask: u16,
    pub data: EntitySnapshot,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct StateUpdate {
    pub tick: u64,
    pub wall_time_ms: u64,
    pub game_time_ms: u64,
    pub input_acks: Vec<(PlayerId, u32)>,
    pub deltas: Vec<EntityDelta>,
    pub removed: Vec<EntityId>,
    pub events: Vec<GameEvent>,
    pub last_event_id: Option<EventId>,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct FullStateSnapshot {
    pub tick: u64,
    pub wall_time_ms: u64,
    pub game_time_ms: u64,
    pub entities: Vec<EntityDelta>,
    pub events: Vec<GameEvent>,
}

fn full_delta(entity: &Entity) -> EntityDelta {
    let snapshot = entity.snapshot();
    let data = change_mask::apply(ChangeMask::FULL, &snapshot);
    EntityDelta { entity_id: entity.id, change_mask: ChangeMask::FULL.bits(), data }
}

/// Per-viewer last-sent-visible-set and baseline; owned by
/// [`Match`](crate::match_::Match), one per connected player.
#[derive(Debug, Default)]
pub struct ViewerState {
    pub baseline: Baseline,
    pub last_visible: std::collections::HashSet<EntityId>,
}

/// Stateless given a [`ViewerState`] and [`EntityPrioritizer`] — both owned
/// by the caller so multiple viewers can be served from one serializer.
pub struct SnapshotSerializer;

impl SnapshotSerializer {
    /// Builds one viewer's `StateUpdate`. `visible` must be this viewer's
    /// team's currently visible entity set (from
    /// [`VisibilitySystem`](crate::visibility::VisibilitySystem)); `champion`
    /// is the viewer's own entity id, used for priority distance.
    #[allow(clippy::too_many_arguments)]
    pub fn build_update(
        viewer: PlayerId,
        champion: Option<Entity>,
        registry: &HashMap<EntityId, Entity>,
        visible: &[EntityId],
        viewer_state: &mut ViewerState,
        prioritizer: &mut EntityPrioritizer,
        tick: u64,
        wall_time_ms: u64,
        game_time_ms: u64,
        input_acks: Vec<(PlayerId, u32)>,
        events: Vec<GameEvent>,
        last_event_id: Option<EventId>,
    ) -> StateUpdate {
        let champion_position = champion.as_ref().map_or(glam::Vec2::ZERO, |c| c.position);
        // A viewer without a champion (e.g. a spectator) never matches `entity
        // == viewer_champion` in the prioritizer's tier lookup, which is the
        // intended effect: no entity gets free own-tier cadence.
        let champion_id = champion.as_ref().map_or(EntityId(u32::MAX), |c| c.id);

        let mut deltas = Vec::new();
        let mut current_visible = std::collections::HashSet::with_capacity(visible.len());

        for &id in visible {
            let Some(entity) = registry.get(&id) else { continue };
            current_visible.insert(id);

            let snapshot = entity.snapshot();
            let critical_forced = match viewer_state.baseline.get(&id) {
                Some(prev) => change_mask::diff(prev, &snapshot).is_critical(),
                None => false,
            };
            if critical_forced {
                prioritizer.force_next_tick(viewer, id, tick);
            }

            if !prioritizer.is_eligible(viewer, champion_id, id, champion_position, entity.position, tick) {
                continue;
            }

            match viewer_state.baseline.get(&id) {
                None => {
                    let data = change_mask::apply(ChangeMask::FULL, &snapshot);
                    deltas.push(EntityDelta { entity_id: id, change_mask: ChangeMask::FULL.bits(), data });
                }
                Some(prev) => {
                    let mask = change_mask::diff(prev, &snapshot);
                    if mask.is_empty() {
                        continue;
                    }
                    let data = change_mask::apply(mask, &snapshot);
                    deltas.push(EntityDelta { entity_id: id, change_mask: mask.bits(), data });
                }
            }
            viewer_state.baseline.insert(id, snapshot);
        }

        let removed: Vec<EntityId> = viewer_state
            .last_visible
            .difference(&current_visible)
            .copied()
            .collect();
        for id in &removed {
            viewer_state.baseline.remove(id);
            prioritizer.remove_entity(*id);
        }
        viewer_state.last_visible = current_visible;

        StateUpdate {
            tick,
            wall_time_ms,
            game_time_ms,
            input_acks,
            deltas,
            removed,
            events,
            last_event_id,
        }
    }

    /// Full, baseline-ignoring snapshot for a (re)connecting viewer.
    pub fn build_full_snapshot(
        registry: &HashMap<EntityId, Entity>,
        visible: &[EntityId],
        tick: u64,
        wall_time_ms: u64,
        game_time_ms: u64,
    ) -> FullStateSnapshot {
        let entities = visible
            .iter()
            .filter_map(|id| registry.get(id))
            .map(full_delta)
            .collect();
        FullStateSnapshot { tick, wall_time_ms, game_time_ms, entities, events: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Side};
    use crate::snapshot::priority::PriorityConfig;
    use glam::Vec2;

    fn champion(id: u32, pos: Vec2) -> Entity {
        Entity::new(EntityId(id), EntityKind::Champion, Some(Side::A), pos)
    }

    #[test]
    fn first_sight_sends_full_snapshot() {
        let mut registry = HashMap::new();
        let e = champion(2, Vec2::ZERO);
        registry.insert(e.id, e.clone());

        let mut viewer_state = ViewerState::default();
        let mut prioritizer = EntityPrioritizer::new(PriorityConfig::default());

        let update = SnapshotSerializer::build_update(
            PlayerId(1),
            Some(e.clone()),
            &registry,
            &[e.id],
            &mut viewer_state,
            &mut prioritizer,
            0,
            0,
            0,
            Vec::new(),
            Vec::new(),
            None,
        );

        assert_eq!(update.deltas.len(), 1);
        assert_eq!(update.deltas[0].change_mask, ChangeMask::FULL.bits());
    }

    #[test]
    fn unchanged_entity_produces_no_delta_on_second_tick() {
        let mut registry = HashMap::new();
        let e = champion(2, Vec2::ZERO);
        registry.insert(e.id, e.clone());

        let mut viewer_state = ViewerState::default();
        let mut prioritizer = EntityPrioritizer::new(PriorityConfig::default());

        SnapshotSerializer::build_update(
            PlayerId(1), Some(e.clone()), &registry, &[e.id], &mut viewer_state, &mut prioritizer,
            0, 0, 0, Vec::new(), Vec::new(), None,
        );
        let update = SnapshotSerializer::build_update(
            PlayerId(1), Some(e.clone()), &registry, &[e.id], &mut viewer_state, &mut prioritizer,
            1, 0, 0, Vec::new(), Vec::new(), None,
        );

        assert!(update.deltas.is_empty());
    }

    #[test]
    fn position_only_change_carries_no_other_field_family() {
        use crate::entity::{Health, Resource};

        let mut registry = HashMap::new();
        let mut e = champion(2, Vec2::ZERO);
        e.snapshot.health = Some(Health { current: 80.0, max: 100.0 });
        e.snapshot.resource = Some(Resource { current: 30.0, max: 50.0 });
        registry.insert(e.id, e.clone());

        let mut viewer_state = ViewerState::default();
        let mut prioritizer = EntityPrioritizer::new(PriorityConfig::default());

        SnapshotSerializer::build_update(
            PlayerId(1), Some(e.clone()), &registry, &[e.id], &mut viewer_state, &mut prioritizer,
            0, 0, 0, Vec::new(), Vec::new(), None,
        );

        let mut moved = e.clone();
        moved.position = Vec2::new(50.0, 0.0);
        registry.insert(moved.id, moved.clone());

        let update = SnapshotSerializer::build_update(
            PlayerId(1), Some(moved.clone()), &registry, &[moved.id], &mut viewer_state, &mut prioritizer,
            1, 0, 0, Vec::new(), Vec::new(), None,
        );

        assert_eq!(update.deltas.len(), 1);
        let delta = &update.deltas[0];
        assert_eq!(delta.change_mask, ChangeMask::POSITION.bits());
        assert_eq!(delta.data.position, Vec2::new(50.0, 0.0));
        assert_eq!(delta.data.health, None);
        assert_eq!(delta.data.resource, None);
    }

    #[test]
    fn entity_leaving_visible_set_emits_removal() {
        let mut registry = HashMap::new();
        let e = champion(2, Vec2::ZERO);
        registry.insert(e.id, e.clone());

        let mut viewer_state = ViewerState::default();
        let mut prioritizer = EntityPrioritizer::new(PriorityConfig::default());

        SnapshotSerializer::build_update(
            PlayerId(1), Some(e.clone()), &registry, &[e.id], &mut viewer_state, &mut prioritizer,
            0, 0, 0, Vec::new(), Vec::new(), None,
        );
        let update = SnapshotSerializer::build_update(
            PlayerId(1), Some(e), &registry, &[], &mut viewer_state, &mut prioritizer,
            1, 0, 0, Vec::new(), Vec::new(), None,
        );

        assert_eq!(update.removed, vec![EntityId(2)]);
    }
}
