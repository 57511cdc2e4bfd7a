//! Simulation: the thin orchestration layer tying the rules catalogue to the
//! registry.

use glam::Vec2;

use crate::entity::EntityId;
use crate::event::EventBus;
use crate::input::ClientInput;
use crate::match_::PlayerId;
use crate::sim::registry::EntityRegistry;

/// Read-only-ish access handed to rules-catalogue callbacks each tick: the
/// registry (mutable, since rules own entity state), spatial queries, and an
/// event emitter. Kept narrow on purpose — the rules catalogue is an
/// external collaborator, not part of this core.
pub struct SimContext<'a> {
    pub registry: &'a mut EntityRegistry,
    pub events: &'a mut EventBus,
    pub tick: u64,
    pub dt: f32,
}

impl<'a> SimContext<'a> {
    pub fn spatial_query(&self, point: Vec2, radius: f32) -> Vec<EntityId> {
        self.registry.spatial_query(point, radius)
    }

    pub fn emit(&mut self, event: crate::event::GameEvent) {
        self.events.emit(event);
    }
}

/// The champion/ability/effect rules catalogue, plugged into the simulation
/// as an external collaborator of data-driven rules rather than hardcoded
/// into the core.
pub trait RulesCatalogue {
    /// Instantiates entities for each player's chosen champion at spawn
    /// points, plus any static structures (towers, nexuses). Called once
    /// during the `starting` transition.
    fn spawn_initial_world(&mut self, registry: &mut EntityRegistry, players: &[(PlayerId, crate::entity::Side)]);

    /// Validates and applies one input. Returns whether it was accepted;
    /// rejection is silent from the simulation's perspective — the
    /// pipeline's ack still advances regardless of the return value.
    fn apply_input(&mut self, ctx: &mut SimContext, player: PlayerId, input: &ClientInput) -> bool;

    /// Advances one entity by `dt`. Structures first, then champions,
    /// minions, jungle, projectiles, zones — the simulation enforces that
    /// ordering, not the rules catalogue.
    fn update_entity(&mut self, ctx: &mut SimContext, entity: EntityId, dt: f32);

    /// Called once for each entity that transitioned to dead this tick, so
    /// the rules catalogue can award kill/assist rewards. Attribution
    /// (who dealt the killing blow, who assisted) is rules-owned bookkeeping.
    fn on_death(&mut self, ctx: &mut SimContext, victim: EntityId);
}

pub struct Simulation<R: RulesCatalogue> {
    rules: R,
    rule_engine_faults: u64,
}

impl<R: RulesCatalogue> Simulation<R> {
    pub fn new(rules: R) -> Self {
        Self { rules, rule_engine_faults: 0 }
    }

    pub fn rule_engine_faults(&self) -> u64 {
        self.rule_engine_faults
    }

    pub fn spawn_initial_world(
        &mut self,
        registry: &mut EntityRegistry,
        players: &[(PlayerId, crate::entity::Side)],
    ) {
        self.rules.spawn_initial_world(registry, players);
    }

    pub fn apply_input(
        &mut self,
        registry: &mut EntityRegistry,
        events: &mut EventBus,
        tick: u64,
        dt: f32,
        player: PlayerId,
        input: &ClientInput,
    ) -> bool {
        let mut ctx = SimContext { registry, events, tick, dt };
        self.rules.apply_input(&mut ctx, player, input)
    }

    /// Advances every live entity in deterministic kind order, then
    /// reconciles the entities that died this tick. A panic inside a single
    /// entity's update is caught so it can't stop the match.
    pub fn update(&mut self, registry: &mut EntityRegistry, events: &mut EventBus, tick: u64, dt: f32) {
        let mut ordered: Vec<(u8, EntityId)> =
            registry.iter().filter(|e| e.alive).map(|e| (e.kind.update_order(), e.id)).collect();
        ordered.sort_by_key(|(order, _)| *order);

        for (_, id) in ordered {
            let rules = &mut self.rules;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut ctx = SimContext { registry, events, tick, dt };
                rules.update_entity(&mut ctx, id, dt);
            }));

            if result.is_err() {
                self.rule_engine_faults += 1;
                log::error!("entity {:?} update panicked; removing (rule_engine_fault)", id);
                if let Some(entity) = registry.get_mut(id) {
                    entity.kill(tick);
                }
            }
        }

        self.reconcile_deaths(registry, events, tick);
    }

    fn reconcile_deaths(&mut self, registry: &mut EntityRegistry, events: &mut EventBus, tick: u64) {
        let newly_dead: Vec<EntityId> = registry
            .iter()
            .filter(|e| !e.alive && e.death_tick == Some(tick))
            .map(|e| e.id)
            .collect();

        for victim in newly_dead {
            let mut ctx = SimContext { registry, events, tick, dt: 0.0 };
            self.rules.on_death(&mut ctx, victim);
        }

        let to_retire: Vec<EntityId> = registry
            .iter()
            .filter(|e| !e.alive && e.death_tick.is_some_and(|dt| dt < tick))
            .map(|e| e.id)
            .collect();
        for id in to_retire {
            registry.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityKind, Side};

    struct NoopRules;
    impl RulesCatalogue for NoopRules {
        fn spawn_initial_world(&mut self, _: &mut EntityRegistry, _: &[(PlayerId, Side)]) {}
        fn apply_input(&mut self, _: &mut SimContext, _: PlayerId, _: &ClientInput) -> bool {
            true
        }
        fn update_entity(&mut self, _: &mut SimContext, _: EntityId, _: f32) {}
        fn on_death(&mut self, _: &mut SimContext, _: EntityId) {}
    }

    struct PanickingRules;
    impl RulesCatalogue for PanickingRules {
        fn spawn_initial_world(&mut self, _: &mut EntityRegistry, _: &[(PlayerId, Side)]) {}
        fn apply_input(&mut self, _: &mut SimContext, _: PlayerId, _: &ClientInput) -> bool {
            true
        }
        fn update_entity(&mut self, _: &mut SimContext, _: EntityId, _: f32) {
            panic!("boom");
        }
        fn on_death(&mut self, _: &mut SimContext, _: EntityId) {}
    }

    #[test]
    fn dead_entity_retired_one_tick_later() {
        let mut sim = Simulation::new(NoopRules);
        let mut registry = EntityRegistry::new(50.0);
        let mut events = EventBus::new();
        let id = registry.spawn(|id| Entity::new(id, EntityKind::Minion, None, Vec2::ZERO));

        registry.get_mut(id).unwrap().kill(5);
        sim.update(&mut registry, &mut events, 5, 0.01);
        assert!(registry.contains(id), "grace tick: still present the tick it died");

        sim.update(&mut registry, &mut events, 6, 0.01);
        assert!(!registry.contains(id), "removed the tick after death");
    }

    #[test]
    fn entity_panic_is_contained() {
        let mut sim = Simulation::new(PanickingRules);
        let mut registry = EntityRegistry::new(50.0);
        let mut events = EventBus::new();
        let id = registry.spawn(|id| Entity::new(id, EntityKind::Champion, Some(Side::A), Vec2::ZERO));

        sim.update(&mut registry, &mut events, 1, 0.01);

        assert_eq!(sim.rule_engine_faults(), 1);
        assert!(!registry.get(id).unwrap().alive);
    }
}
