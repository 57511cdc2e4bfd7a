//! Match orchestrator: owns one match's full lifecycle and per-tick pipeline.
//! One `Match` is one worker's worth of state.

use std::collections::HashMap;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Side};
use crate::event::{EventBus, EventId, GameEvent, ReliabilityMode, ReliableEventQueue};
use crate::input::{ClientInput, InputEnvelope, InputPipeline};
use crate::sim::{EntityRegistry, RulesCatalogue, Simulation};
use crate::snapshot::{EntityPrioritizer, FullStateSnapshot, PriorityConfig, SnapshotSerializer, StateUpdate, ViewerState};
use crate::visibility::VisibilitySystem;

/// Opaque, host-assigned player identity. Never reused within a match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[rkyv(derive(Debug, PartialEq, Eq, Hash))]
pub struct PlayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Waiting,
    Starting,
    Playing,
    Ended,
}

/// Per-match tunables. No file-format loader — a plain struct with
/// `Default`, overridden by the host's CLI/lobby layer.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub tick_rate: u32,
    pub visibility_cell_size: f32,
    pub priority: PriorityConfig,
    pub reliable_initial_resend_ticks: u64,
    pub reliable_backoff_factor: f32,
    pub reliable_cap_ticks: u64,
    pub reliable_max_attempts: u32,
    pub input_rate_limit_per_sec: u32,
    pub input_reorder_window_ticks: u64,
    pub spatial_cell_size: f32,
    /// Assist window for kill-credit attribution. Rules-catalogue data, not
    /// consumed by `Match` itself, but collected here since it's one of the
    /// per-match tunables a host configures.
    pub assist_window_ticks: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tick_rate: 125,
            visibility_cell_size: 100.0,
            priority: PriorityConfig::default(),
            reliable_initial_resend_ticks: 25,
            reliable_backoff_factor: 2.0,
            reliable_cap_ticks: 625,
            reliable_max_attempts: 8,
            input_rate_limit_per_sec: 60,
            input_reorder_window_ticks: 50,
            spatial_cell_size: 150.0,
            assist_window_ticks: 1250,
        }
    }
}

#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(derive(Debug))]
pub struct EntityAssignment {
    pub player: PlayerId,
    pub champion_id: EntityId,
    pub side: Side,
    pub entity_id: EntityId,
}

/// Outbound messages, keyed by playerId. Carried over the wire inside
/// [`crate::net::PacketType`].
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(derive(Debug))]
pub enum OutboundMessage {
    GameStart { assignments: Vec<EntityAssignment> },
    FullStateSnapshot(FullStateSnapshot),
    StateUpdate(StateUpdate),
    GameEnd { winning_side: Side },
    Error { detail: String },
}

/// Inbound messages, host to core.
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(derive(Debug))]
pub enum InboundMessage {
    Input(PlayerId, InputEnvelope),
    EventAck(PlayerId, EventId),
    Connect(PlayerId),
    Disconnect(PlayerId),
    Ready(PlayerId),
}

/// The host-provided, non-blocking delivery boundary — the only
/// asynchronous boundary in the tick loop. `Match` only ever enqueues; it
/// never reads back.
pub trait OutboundSink {
    fn send(&mut self, player: PlayerId, message: OutboundMessage);
}

struct PlayerInfo {
    side: Side,
    champion_id: EntityId,
    connected: bool,
    ready: bool,
}

/// Owns everything inside one match; owned exclusively by that match's
/// worker. Generic over the rules-catalogue implementation plugged in by
/// the caller.
pub struct Match<R: RulesCatalogue> {
    config: MatchConfig,
    state: MatchState,
    tick: u64,
    game_time_ms: u64,

    registry: EntityRegistry,
    events: EventBus,
    reliable: ReliableEventQueue,
    input: InputPipeline,
    visibility: VisibilitySystem,
    prioritizer: EntityPrioritizer,
    simulation: Simulation<R>,

    players: HashMap<PlayerId, PlayerInfo>,
    viewer_states: HashMap<PlayerId, ViewerState>,
    nexus_destroyed: std::collections::HashSet<Side>,
}

impl<R: RulesCatalogue> Match<R> {
    pub fn new(config: MatchConfig, rules: R) -> Self {
        let registry = EntityRegistry::new(config.spatial_cell_size);
        let visibility = VisibilitySystem::new(config.visibility_cell_size);
        let prioritizer = EntityPrioritizer::new(config.priority);
        let reliable = ReliableEventQueue::new(
            config.reliable_initial_resend_ticks,
            config.reliable_backoff_factor,
            config.reliable_cap_ticks,
            config.reliable_max_attempts,
        );
        let input = InputPipeline::new(
            config.input_rate_limit_per_sec,
            config.tick_rate,
            config.input_reorder_window_ticks,
        );

        Self {
            config,
            state: MatchState::Waiting,
            tick: 0,
            game_time_ms: 0,
            registry,
            events: EventBus::new(),
            reliable,
            input,
            visibility,
            prioritizer,
            simulation: Simulation::new(rules),
            players: HashMap::new(),
            viewer_states: HashMap::new(),
            nexus_destroyed: std::collections::HashSet::new(),
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn tick_number(&self) -> u64 {
        self.tick
    }

    /// Registers a player and their side before `start()`. Champion/entity
    /// assignment happens inside `start()` via the rules catalogue.
    pub fn register_player(&mut self, player: PlayerId, side: Side) {
        self.players.insert(
            player,
            PlayerInfo { side, champion_id: EntityId(0), connected: true, ready: false },
        );
        self.viewer_states.insert(player, ViewerState::default());
    }

    pub fn handle_ready(&mut self, player: PlayerId) {
        if self.state != MatchState::Waiting {
            return;
        }
        if let Some(info) = self.players.get_mut(&player) {
            info.ready = true;
        }
    }

    fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.ready)
    }

    /// Returns a human-readable violation description if either side doesn't
    /// have exactly one live Nexus.
    fn check_nexus_invariant(&self) -> Option<String> {
        let mut counts: HashMap<Side, u32> = HashMap::new();
        for entity in self.registry.iter() {
            if entity.alive && entity.kind == crate::entity::EntityKind::Nexus {
                if let Some(side) = entity.side {
                    *counts.entry(side).or_insert(0) += 1;
                }
            }
        }
        for side in [Side::A, Side::B] {
            let count = counts.get(&side).copied().unwrap_or(0);
            if count != 1 {
                return Some(format!("side {side:?} has {count} nexus entities, expected exactly 1"));
            }
        }
        None
    }

    /// `waiting -> starting -> playing`. Errors (by returning false) if
    /// already started.
    pub fn start(&mut self, sink: &mut impl OutboundSink) -> bool {
        if self.state != MatchState::Waiting {
            log::warn!("start() called but match is not waiting (state={:?})", self.state);
            return false;
        }
        self.state = MatchState::Starting;

        let roster: Vec<(PlayerId, Side)> = self.players.iter().map(|(p, info)| (*p, info.side)).collect();
        self.simulation.spawn_initial_world(&mut self.registry, &roster);

        // Invariant: exactly one Nexus per side. A rules catalogue that
        // violates this is a contract breach, not a recoverable gameplay
        // state — the match ends immediately with an Error to every viewer.
        if let Some(detail) = self.check_nexus_invariant() {
            log::error!("invariant violation during start(): {detail}");
            self.state = MatchState::Ended;
            for player in self.players.keys().copied().collect::<Vec<_>>() {
                sink.send(player, OutboundMessage::Error { detail: detail.clone() });
            }
            return false;
        }

        // The rules catalogue spawns champions in roster order; assignment
        // to players is positional within each side (one champion per
        // player, spawn order matches registration order).
        let mut by_side: HashMap<Side, Vec<EntityId>> = HashMap::new();
        for entity in self.registry.iter() {
            if entity.kind == crate::entity::EntityKind::Champion {
                if let Some(side) = entity.side {
                    by_side.entry(side).or_default().push(entity.id);
                }
            }
        }
        let mut cursor: HashMap<Side, usize> = HashMap::new();
        let mut assignments = Vec::new();
        for (player, side) in &roster {
            let idx = cursor.entry(*side).or_insert(0);
            if let Some(champion_id) = by_side.get(side).and_then(|ids| ids.get(*idx)).copied() {
                *idx += 1;
                if let Some(info) = self.players.get_mut(player) {
                    info.champion_id = champion_id;
                }
                assignments.push(EntityAssignment {
                    player: *player,
                    champion_id,
                    side: *side,
                    entity_id: champion_id,
                });
            }
        }

        self.state = MatchState::Playing;
        for player in self.players.keys().copied().collect::<Vec<_>>() {
            sink.send(player, OutboundMessage::GameStart { assignments: assignments.clone() });
        }
        true
    }

    /// Transitions to `ended` regardless of current state.
    pub fn stop(&mut self) {
        self.state = MatchState::Ended;
    }

    pub fn handle_input(&mut self, player: PlayerId, envelope: InputEnvelope) {
        if self.state != MatchState::Playing {
            return;
        }
        self.input.enqueue(player, envelope, self.tick);
    }

    pub fn handle_event_ack(&mut self, player: PlayerId, last_event_id: EventId) {
        self.reliable.ack(player, last_event_id);
    }

    /// Marks disconnected; clears pipeline queue, serializer baseline, and
    /// reliable event state. The champion remains in the world.
    pub fn handle_disconnect(&mut self, player: PlayerId) {
        if let Some(info) = self.players.get_mut(&player) {
            info.connected = false;
        }
        self.input.remove_player(player);
        self.reliable.on_disconnect(player);
        if let Some(vs) = self.viewer_states.get_mut(&player) {
            *vs = ViewerState::default();
        }
        self.prioritizer.remove_viewer(EntityId(player.0));
    }

    /// Returns a full snapshot of currently visible entities; the client
    /// treats this as a baseline reset.
    pub fn handle_reconnect(&mut self, player: PlayerId) -> Option<FullStateSnapshot> {
        let info = self.players.get_mut(&player)?;
        info.connected = true;
        let side = info.side;

        let visible = self.visibility.visible_entities(side, &self.registry);
        let by_id: HashMap<EntityId, Entity> = self.registry.iter().map(|e| (e.id, e.clone())).collect();
        let snapshot = SnapshotSerializer::build_full_snapshot(&by_id, &visible, self.tick, 0, self.game_time_ms);

        if let Some(vs) = self.viewer_states.get_mut(&player) {
            vs.baseline.clear();
            vs.last_visible = visible.into_iter().collect();
            for id in &vs.last_visible {
                if let Some(e) = by_id.get(id) {
                    vs.baseline.insert(*id, e.snapshot());
                }
            }
        }
        Some(snapshot)
    }

    /// Advances the match by one tick, running the full pipeline: apply
    /// ready inputs, simulate, recompute visibility, classify + enqueue
    /// events, and broadcast one `StateUpdate` per connected viewer.
    pub fn tick(&mut self, dt: f32, wall_time_ms: u64, sink: &mut impl OutboundSink) {
        if self.state != MatchState::Playing {
            return;
        }
        self.tick += 1;
        self.game_time_ms += (dt * 1000.0) as u64;

        // Inputs across players within the same tick are applied in a
        // stable order (by player id) so the tick is deterministic.
        let mut players: Vec<PlayerId> = self.players.keys().copied().collect();
        players.sort();
        for player in &players {
            for envelope in self.input.drain_ready(*player, self.tick) {
                self.simulation.apply_input(
                    &mut self.registry,
                    &mut self.events,
                    self.tick,
                    dt,
                    *player,
                    &envelope.payload,
                );
            }
        }

        self.simulation.update(&mut self.registry, &mut self.events, self.tick, dt);
        for removed in self.registry.drain_removed() {
            self.prioritizer.remove_entity(removed);
        }

        for side in [Side::A, Side::B] {
            let sight_sources: Vec<(glam::Vec2, f32)> = self
                .registry
                .iter()
                .filter(|e| e.alive && e.side == Some(side) && e.sight_radius > 0.0)
                .map(|e| (e.position, e.sight_radius))
                .collect();
            self.visibility.recompute(side, sight_sources.into_iter());
        }

        let tick_events = self.events.drain();
        let mut unreliable_events: Vec<GameEvent> = Vec::new();
        for event in tick_events {
            match event.reliability() {
                ReliabilityMode::Reliable => {
                    if let GameEvent::NexusDestroyed { side, .. } = &event {
                        self.nexus_destroyed.insert(*side);
                    }
                    let recipients: Vec<PlayerId> = self.players.iter().filter(|(_, i)| i.connected).map(|(p, _)| *p).collect();
                    self.reliable.enqueue_broadcast(event, recipients, self.tick);
                }
                ReliabilityMode::Unreliable => unreliable_events.push(event),
            }
        }

        if self.nexus_destroyed.len() == 2 {
            // Both nexuses destroyed the same tick: no well-defined winner.
            // Treated as an invariant violation rather than silently picking
            // a side.
            self.broadcast(dt, wall_time_ms, sink, &unreliable_events);
            self.state = MatchState::Ended;
            let detail = "both sides' nexus destroyed in the same tick".to_string();
            for player in self.players.keys().copied().collect::<Vec<_>>() {
                sink.send(player, OutboundMessage::Error { detail: detail.clone() });
            }
            return;
        }

        if self.nexus_destroyed.len() == 1 {
            let winning_side = self.nexus_destroyed.iter().next().unwrap().opposite();
            self.broadcast(dt, wall_time_ms, sink, &unreliable_events);
            self.state = MatchState::Ended;
            for player in self.players.keys().copied().collect::<Vec<_>>() {
                sink.send(player, OutboundMessage::GameEnd { winning_side });
            }
            return;
        }

        self.broadcast(dt, wall_time_ms, sink, &unreliable_events);
    }

    fn broadcast(&mut self, _dt: f32, wall_time_ms: u64, sink: &mut impl OutboundSink, unreliable_events: &[GameEvent]) {
        let by_id: HashMap<EntityId, Entity> = self.registry.iter().map(|e| (e.id, e.clone())).collect();
        let acks = self.input.ack_map();

        let players: Vec<PlayerId> = self.players.keys().copied().collect();
        for player in players {
            let info = &self.players[&player];
            if !info.connected {
                continue;
            }
            let side = info.side;
            let champion_id = info.champion_id;
            let champion = by_id.get(&champion_id).cloned();

            let visible = self.visibility.visible_entities(side, &self.registry);
            let visible_set: std::collections::HashSet<EntityId> = visible.iter().copied().collect();
            let viewer_events: Vec<GameEvent> = unreliable_events
                .iter()
                .filter(|e| e.involved_entities().iter().any(|id| visible_set.contains(id)))
                .cloned()
                .collect();

            let (mut due_reliable, last_event_id) = self.reliable.due_for_broadcast(player, self.tick);
            due_reliable.extend(viewer_events);

            let viewer_state = self.viewer_states.entry(player).or_default();
            let update = SnapshotSerializer::build_update(
                EntityId(player.0),
                champion,
                &by_id,
                &visible,
                viewer_state,
                &mut self.prioritizer,
                self.tick,
                wall_time_ms,
                self.game_time_ms,
                acks.clone(),
                due_reliable,
                last_event_id,
            );
            sink.send(player, OutboundMessage::StateUpdate(update));
        }
    }
}
