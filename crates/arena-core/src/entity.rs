//! Tagged-variant entity model.
//!
//! Kind-specific attributes are opaque to the core: they live in
//! [`EntitySnapshot`]'s optional field families and pass straight through to
//! the wire. The core only relies on the common fields below plus each
//! entity's own `snapshot()`. Field-family types are dual-derived (serde for
//! internal/debug use, rkyv because [`EntitySnapshot`] rides the wire inside
//! `FullStateSnapshot` and per-field inside a delta's `DeltaData`).

use std::collections::HashMap;

use glam::Vec2;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// Opaque, match-local, monotonically allocated, never reused.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[rkyv(derive(Debug, PartialEq, Eq, Hash))]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[rkyv(derive(Debug, PartialEq, Eq))]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Champion,
    Minion,
    Tower,
    Nexus,
    JungleCreature,
    Projectile,
    Ward,
    Zone,
}

impl EntityKind {
    /// Deterministic per-tick update order: structures first, then
    /// champions, minions, jungle, projectiles, zones.
    pub fn update_order(self) -> u8 {
        match self {
            EntityKind::Tower | EntityKind::Nexus => 0,
            EntityKind::Champion => 1,
            EntityKind::Minion => 2,
            EntityKind::JungleCreature => 3,
            EntityKind::Projectile => 4,
            EntityKind::Ward => 4,
            EntityKind::Zone => 5,
        }
    }
}

bitflags::bitflags! {
    /// Boolean flags that belong to the `state` change-mask family. Stored on
    /// the wire as a raw `u16` (see [`EntitySnapshot::state`]) since bitflags
    /// types don't derive rkyv; `.bits()`/`from_bits_truncate` cross the seam.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StateFlags: u16 {
        const ATTACKING       = 1 << 0;
        const RECALLING       = 1 << 1;
        const STEALTHED       = 1 << 2;
        const REQUIRES_TRUE_SIGHT = 1 << 3;
        const ROOTED          = 1 << 4;
        const SILENCED        = 1 << 5;
        const DEAD            = 1 << 6;
    }
}

macro_rules! wire_struct {
    ($(#[$meta:meta])* $name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
        #[rkyv(derive(Debug))]
        pub struct $name {
            $(pub $field: $ty),*
        }
    };
}

wire_struct!(Health { current: f32, max: f32 });
wire_struct!(Resource { current: f32, max: f32 });
wire_struct!(LevelInfo { level: u32, kills: u32, assists: u32, deaths: u32 });
wire_struct!(EffectInstance { effect_id: u32, stacks: u32, remaining_ticks: u32 });
wire_struct!(AbilityState { slot: u8, level: u8, cooldown_remaining: f32 });
wire_struct!(ItemState { slot: u8, item_id: u32, stacks: u32 });
wire_struct!(TrinketState { item_id: u32, cooldown_remaining: f32 });
wire_struct!(ShieldInstance { amount: f32, remaining_ticks: u32 });
wire_struct!(PassiveState { charges: u32, cooldown_remaining: f32 });

/// The flat record an entity's `snapshot()` returns: everything a viewer may
/// observe, grouped into the field families the change mask tracks. Rides
/// the wire directly inside `FullStateSnapshot`, so every field here must be
/// rkyv-archivable — `state` is therefore raw bits, not [`StateFlags`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(derive(Debug))]
pub struct EntitySnapshot {
    pub position: Vec2,
    pub health: Option<Health>,
    pub resource: Option<Resource>,
    pub level: Option<LevelInfo>,
    pub effects: Vec<EffectInstance>,
    pub abilities: Vec<AbilityState>,
    pub items: Vec<ItemState>,
    pub target: Option<EntityId>,
    pub state: u16,
    pub trinket: Option<TrinketState>,
    pub gold: Option<u32>,
    pub shields: Vec<ShieldInstance>,
    pub passive: Option<PassiveState>,
}

impl EntitySnapshot {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            health: None,
            resource: None,
            level: None,
            effects: Vec::new(),
            abilities: Vec::new(),
            items: Vec::new(),
            target: None,
            state: 0,
            trinket: None,
            gold: None,
            shields: Vec::new(),
            passive: None,
        }
    }

    pub fn state_flags(&self) -> StateFlags {
        StateFlags::from_bits_truncate(self.state)
    }
}

/// An entity inside the registry. `kind`-specific state is carried opaquely
/// in `snapshot`; the core only inspects the fields below.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub side: Option<Side>,
    pub alive: bool,
    pub sight_radius: f32,
    pub requires_true_sight: bool,
    /// True sight: pierces `requires_true_sight` on enemies within this
    /// entity's `sight_radius`. Set on control wards, not on ordinary
    /// champion vision.
    pub provides_true_sight: bool,
    pub target_entity_id: Option<EntityId>,
    /// Set once `alive` flips to false; the entity is retired after one more
    /// tick so a removal event can be emitted for it.
    pub death_tick: Option<u64>,
    pub snapshot: EntitySnapshot,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, side: Option<Side>, position: Vec2) -> Self {
        Self {
            id,
            kind,
            position,
            side,
            alive: true,
            sight_radius: 0.0,
            requires_true_sight: false,
            provides_true_sight: false,
            target_entity_id: None,
            death_tick: None,
            snapshot: EntitySnapshot::at(position),
        }
    }

    pub fn kill(&mut self, tick: u64) {
        if self.alive {
            self.alive = false;
            self.death_tick = Some(tick);
        }
    }

    pub fn set_flag(&mut self, flag: StateFlags, value: bool) {
        let mut flags = self.snapshot.state_flags();
        flags.set(flag, value);
        self.snapshot.state = flags.bits();
    }

    /// Flattens this entity's observable state. The core never inspects
    /// anything but this return value when building snapshots/deltas.
    pub fn snapshot(&self) -> EntitySnapshot {
        let mut snap = self.snapshot.clone();
        snap.position = self.position;
        snap.target = self.target_entity_id;
        let mut flags = snap.state_flags();
        flags.set(StateFlags::REQUIRES_TRUE_SIGHT, self.requires_true_sight);
        flags.set(StateFlags::DEAD, !self.alive);
        snap.state = flags.bits();
        snap
    }
}

/// Per-viewer last-sent snapshot map.
pub type Baseline = HashMap<EntityId, EntitySnapshot>;
