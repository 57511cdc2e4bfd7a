//! `DemoRulesCatalogue`: a minimal, concrete [`RulesCatalogue`] so
//! `arena-server` has something to actually run. The champion/ability/effect
//! rules catalogue proper is an external collaborator — this is deliberately
//! thin: nexuses and champions with health, straight-line movement, and
//! basic-attack combat against a targeted unit. No abilities, items with
//! real effects, jungle, or minion waves. Narrowed to what's needed to
//! exercise every `arena-core` subsystem end-to-end.

use std::collections::HashMap;

use glam::Vec2;

use arena_core::{
    ClientInput, Entity, EntityId, EntityKind, EntityRegistry, GameEvent, Health, ItemState,
    LevelInfo, PlayerId, Resource, RulesCatalogue, SimContext, Side, StateFlags,
};

#[derive(Debug, Clone)]
pub struct DemoRulesConfig {
    pub champion_speed: f32,
    pub champion_max_health: f32,
    pub champion_sight_radius: f32,
    pub attack_range: f32,
    pub attack_damage: f32,
    pub attack_interval_ticks: u64,
    pub nexus_max_health: f32,
    pub nexus_sight_radius: f32,
    pub ward_sight_radius: f32,
    pub ward_lifetime_ticks: u64,
    pub spawn_a: Vec2,
    pub spawn_b: Vec2,
    pub nexus_a: Vec2,
    pub nexus_b: Vec2,
    pub assist_window_ticks: u64,
    pub starting_gold: u32,
}

impl Default for DemoRulesConfig {
    fn default() -> Self {
        Self {
            champion_speed: 325.0,
            champion_max_health: 600.0,
            champion_sight_radius: 1200.0,
            attack_range: 150.0,
            attack_damage: 60.0,
            attack_interval_ticks: 125,
            nexus_max_health: 5000.0,
            nexus_sight_radius: 1000.0,
            ward_sight_radius: 900.0,
            ward_lifetime_ticks: 125 * 90,
            spawn_a: Vec2::new(-4000.0, -4000.0),
            spawn_b: Vec2::new(4000.0, 4000.0),
            nexus_a: Vec2::new(-4500.0, -4500.0),
            nexus_b: Vec2::new(4500.0, 4500.0),
            assist_window_ticks: 1250,
            starting_gold: 500,
        }
    }
}

/// Rules-owned, per-champion bookkeeping that has no home on the core
/// `Entity`, which keeps kind-specific state opaque.
#[derive(Debug, Default, Clone)]
struct ChampionState {
    move_target: Option<Vec2>,
    attack_cooldown: u64,
    /// Attacker + tick, trimmed to `assist_window_ticks`, for kill/assist
    /// attribution: the last applied source is the killer, earlier sources
    /// within the last N ticks are assisters.
    recent_damage: Vec<(EntityId, u64)>,
    expire_tick: Option<u64>,
}

pub struct DemoRulesCatalogue {
    config: DemoRulesConfig,
    state: HashMap<EntityId, ChampionState>,
    nexus_ids: HashMap<Side, EntityId>,
    champion_of: HashMap<PlayerId, EntityId>,
}

impl DemoRulesCatalogue {
    pub fn new(config: DemoRulesConfig) -> Self {
        Self { config, state: HashMap::new(), nexus_ids: HashMap::new(), champion_of: HashMap::new() }
    }

    fn spawn_point(&self, side: Side) -> Vec2 {
        match side {
            Side::A => self.config.spawn_a,
            Side::B => self.config.spawn_b,
        }
    }

    fn nexus_point(&self, side: Side) -> Vec2 {
        match side {
            Side::A => self.config.nexus_a,
            Side::B => self.config.nexus_b,
        }
    }

    fn record_damage(&mut self, victim: EntityId, attacker: EntityId, tick: u64) {
        let window = self.config.assist_window_ticks;
        let entry = self.state.entry(victim).or_default();
        entry.recent_damage.retain(|(_, t)| tick.saturating_sub(*t) <= window);
        entry.recent_damage.push((attacker, tick));
    }

    fn deal_damage(&mut self, ctx: &mut SimContext, attacker: EntityId, target: EntityId, amount: f32, tick: u64) {
        let Some(entity) = ctx.registry.get_mut(target) else { return };
        let Some(mut health) = entity.snapshot.health else { return };
        health.current = (health.current - amount).max(0.0);
        entity.snapshot.health = Some(health);
        let died = health.current <= 0.0;
        ctx.emit(GameEvent::Damage { source: attacker, target, amount });
        self.record_damage(target, attacker, tick);
        if died {
            ctx.registry.get_mut(target).unwrap().kill(tick);
        }
    }
}

impl RulesCatalogue for DemoRulesCatalogue {
    fn spawn_initial_world(&mut self, registry: &mut EntityRegistry, players: &[(PlayerId, Side)]) {
        for side in [Side::A, Side::B] {
            let id = registry.spawn(|id| {
                let mut e = Entity::new(id, EntityKind::Nexus, Some(side), self.nexus_point(side));
                e.sight_radius = self.config.nexus_sight_radius;
                e.snapshot.health = Some(Health { current: self.config.nexus_max_health, max: self.config.nexus_max_health });
                e
            });
            self.nexus_ids.insert(side, id);
        }

        for (player, side) in players {
            let id = registry.spawn(|id| {
                let mut e = Entity::new(id, EntityKind::Champion, Some(*side), self.spawn_point(*side));
                e.sight_radius = self.config.champion_sight_radius;
                e.snapshot.health = Some(Health { current: self.config.champion_max_health, max: self.config.champion_max_health });
                e.snapshot.resource = Some(Resource { current: 100.0, max: 100.0 });
                e.snapshot.level = Some(LevelInfo { level: 1, kills: 0, assists: 0, deaths: 0 });
                e.snapshot.gold = Some(self.config.starting_gold);
                e
            });
            self.champion_of.insert(*player, id);
        }
    }

    fn apply_input(&mut self, ctx: &mut SimContext, player: PlayerId, input: &ClientInput) -> bool {
        let Some(&entity_id) = self.champion_of.get(&player) else { return false };
        if !ctx.registry.get(entity_id).is_some_and(|e| e.alive) {
            return false;
        }

        match input {
            ClientInput::Move { target } | ClientInput::AttackMove { target } => {
                let Some(entity) = ctx.registry.get_mut(entity_id) else { return false };
                let clamped = clamp_to_map(*target);
                entity.target_entity_id = None;
                self.state.entry(entity_id).or_default().move_target = Some(clamped);
                true
            }
            ClientInput::TargetUnit { target } => {
                let Some(victim) = ctx.registry.get(*target) else { return false };
                if !victim.alive {
                    return false;
                }
                if let Some(entity) = ctx.registry.get_mut(entity_id) {
                    entity.target_entity_id = Some(*target);
                }
                self.state.entry(entity_id).or_default().move_target = None;
                true
            }
            ClientInput::Stop => {
                if let Some(entity) = ctx.registry.get_mut(entity_id) {
                    entity.target_entity_id = None;
                }
                self.state.entry(entity_id).or_default().move_target = None;
                true
            }
            ClientInput::LevelUp { slot } => {
                let Some(entity) = ctx.registry.get_mut(entity_id) else { return false };
                let Some(mut level) = entity.snapshot.level else { return false };
                if level.level >= 18 {
                    return false;
                }
                level.level += 1;
                entity.snapshot.level = Some(level);
                ctx.emit(GameEvent::LevelUp { entity: entity_id, level: level.level });
                let _ = slot;
                true
            }
            ClientInput::BuyItem { item_id } => {
                const ITEM_COST: u32 = 100;
                let Some(entity) = ctx.registry.get_mut(entity_id) else { return false };
                let Some(gold) = entity.snapshot.gold else { return false };
                if gold < ITEM_COST || entity.snapshot.items.len() >= 6 {
                    return false;
                }
                entity.snapshot.gold = Some(gold - ITEM_COST);
                let slot = entity.snapshot.items.len() as u8;
                entity.snapshot.items.push(ItemState { slot, item_id: *item_id, stacks: 1 });
                ctx.emit(GameEvent::ItemPurchased { entity: entity_id, item_id: *item_id, slot });
                true
            }
            ClientInput::SellItem { slot } => {
                let Some(entity) = ctx.registry.get_mut(entity_id) else { return false };
                let before = entity.snapshot.items.len();
                entity.snapshot.items.retain(|i| i.slot != *slot);
                before != entity.snapshot.items.len()
            }
            ClientInput::Recall => {
                let Some(entity) = ctx.registry.get_mut(entity_id) else { return false };
                let recalling = entity.snapshot.state_flags().contains(StateFlags::RECALLING);
                entity.set_flag(StateFlags::RECALLING, !recalling);
                true
            }
            ClientInput::PlaceWard { position, ward_kind } => {
                let side = ctx.registry.get(entity_id).and_then(|e| e.side);
                let expire_tick = ctx.tick + self.config.ward_lifetime_ticks;
                let ward_sight = self.config.ward_sight_radius;
                // ward_kind 1 is a control ward: it grants true sight over
                // stealthed units within its sight radius. Any other kind is
                // an ordinary vision ward.
                let provides_true_sight = *ward_kind == 1;
                let ward_id = ctx.registry.spawn(|id| {
                    let mut w = Entity::new(id, EntityKind::Ward, side, clamp_to_map(*position));
                    w.sight_radius = ward_sight;
                    w.provides_true_sight = provides_true_sight;
                    w
                });
                self.state.insert(ward_id, ChampionState { expire_tick: Some(expire_tick), ..Default::default() });
                true
            }
            ClientInput::Ping { .. } | ClientInput::CastAbility { .. } => true,
        }
    }

    fn update_entity(&mut self, ctx: &mut SimContext, entity: EntityId, dt: f32) {
        let kind = ctx.registry.get(entity).map(|e| e.kind);
        match kind {
            Some(EntityKind::Champion) => self.update_champion(ctx, entity, dt),
            Some(EntityKind::Ward) => self.update_ward(ctx, entity),
            _ => {}
        }
    }

    fn on_death(&mut self, ctx: &mut SimContext, victim: EntityId) {
        let Some(victim_entity) = ctx.registry.get(victim) else { return };
        let kind = victim_entity.kind;
        let side = victim_entity.side;

        let damagers = self.state.get(&victim).map(|s| s.recent_damage.clone()).unwrap_or_default();
        let killer = damagers.last().map(|(id, _)| *id);
        let assisters: Vec<EntityId> = damagers[..damagers.len().saturating_sub(1)]
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| Some(*id) != killer)
            .collect();

        match kind {
            EntityKind::Nexus => {
                if let Some(side) = side {
                    ctx.emit(GameEvent::NexusDestroyed { nexus: victim, side });
                }
            }
            EntityKind::Champion => {
                if let Some(killer) = killer {
                    ctx.emit(GameEvent::ChampionKill { killer, victim, assists: assisters });
                    if let Some(killer_entity) = ctx.registry.get_mut(killer) {
                        if let Some(mut level) = killer_entity.snapshot.level {
                            level.kills += 1;
                            killer_entity.snapshot.level = Some(level);
                        }
                    }
                }
                if let Some(victim_entity) = ctx.registry.get_mut(victim) {
                    if let Some(mut level) = victim_entity.snapshot.level {
                        level.deaths += 1;
                        victim_entity.snapshot.level = Some(level);
                    }
                }
                // Demo-only respawn: back at spawn with full health next tick,
                // rather than a real respawn timer (left as unconfigured
                // rules-catalogue data).
                let max_health = self.config.champion_max_health;
                let spawn = side.map(|s| self.spawn_point(s));
                if let (Some(entity), Some(spawn)) = (ctx.registry.get_mut(victim), spawn) {
                    entity.alive = true;
                    entity.death_tick = None;
                    entity.position = spawn;
                    entity.snapshot.health = Some(Health { current: max_health, max: max_health });
                }
                ctx.registry.sync_position(victim);
            }
            _ => {}
        }
        self.state.remove(&victim);
    }
}

impl DemoRulesCatalogue {
    fn update_champion(&mut self, ctx: &mut SimContext, entity_id: EntityId, dt: f32) {
        if let Some(state) = self.state.get_mut(&entity_id) {
            if state.attack_cooldown > 0 {
                state.attack_cooldown = state.attack_cooldown.saturating_sub(1);
            }
        }

        let target_entity = ctx.registry.get(entity_id).and_then(|e| e.target_entity_id);
        if let Some(target) = target_entity {
            let valid = ctx.registry.get(target).is_some_and(|t| t.alive);
            if !valid {
                if let Some(e) = ctx.registry.get_mut(entity_id) {
                    e.target_entity_id = None;
                }
            } else {
                self.pursue_and_attack(ctx, entity_id, target, dt);
                return;
            }
        }

        let move_target = self.state.get(&entity_id).and_then(|s| s.move_target);
        if let Some(dest) = move_target {
            self.move_towards(ctx, entity_id, dest, dt);
        }
    }

    fn move_towards(&mut self, ctx: &mut SimContext, entity_id: EntityId, dest: Vec2, dt: f32) {
        let speed = self.config.champion_speed;
        let Some(entity) = ctx.registry.get_mut(entity_id) else { return };
        let delta = dest - entity.position;
        let distance = delta.length();
        let step = speed * dt;
        if distance <= step {
            entity.position = dest;
            self.state.entry(entity_id).or_default().move_target = None;
        } else {
            entity.position += delta / distance * step;
        }
        ctx.registry.sync_position(entity_id);
    }

    fn pursue_and_attack(&mut self, ctx: &mut SimContext, entity_id: EntityId, target: EntityId, dt: f32) {
        let range = self.config.attack_range;
        let (Some(pos), Some(target_pos)) =
            (ctx.registry.get(entity_id).map(|e| e.position), ctx.registry.get(target).map(|e| e.position))
        else {
            return;
        };

        if pos.distance(target_pos) > range {
            self.move_towards(ctx, entity_id, target_pos, dt);
            return;
        }

        let on_cooldown = self.state.get(&entity_id).is_some_and(|s| s.attack_cooldown > 0);
        if on_cooldown {
            return;
        }

        let tick = ctx.tick;
        ctx.emit(GameEvent::BasicAttack { attacker: entity_id, target });
        let damage = self.config.attack_damage;
        self.deal_damage(ctx, entity_id, target, damage, tick);
        self.state.entry(entity_id).or_default().attack_cooldown = self.config.attack_interval_ticks;
    }

    fn update_ward(&mut self, ctx: &mut SimContext, entity_id: EntityId) {
        if self.state.get(&entity_id).and_then(|s| s.expire_tick).is_some_and(|t| ctx.tick >= t) {
            if let Some(e) = ctx.registry.get_mut(entity_id) {
                e.kill(ctx.tick);
            }
        }
    }
}

const MAP_HALF_EXTENT: f32 = 6000.0;

fn clamp_to_map(point: Vec2) -> Vec2 {
    point.clamp(Vec2::splat(-MAP_HALF_EXTENT), Vec2::splat(MAP_HALF_EXTENT))
}
