//! Game event taxonomy and reliability classification.

use rkyv::{Archive, Deserialize, Serialize};

use crate::entity::{EntityId, Side};

/// A per-match monotonically increasing integer attached to events that
/// require reliable delivery. Unreliable events never get one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug, PartialEq, Eq, PartialOrd, Ord))]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityMode {
    Reliable,
    Unreliable,
}

impl ReliabilityMode {
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::Reliable)
    }
}

/// Gameplay events emitted via the event bus. Carries an opaque payload per
/// variant; always buffered to tick granularity by [`super::EventBus`].
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum GameEvent {
    ChampionKill {
        killer: EntityId,
        victim: EntityId,
        assists: Vec<EntityId>,
    },
    TowerDestroyed {
        tower: EntityId,
        side: Side,
    },
    NexusDestroyed {
        nexus: EntityId,
        side: Side,
    },
    AbilityCast {
        caster: EntityId,
        ability_slot: u8,
        target: Option<EntityId>,
    },
    BasicAttack {
        attacker: EntityId,
        target: EntityId,
    },
    Damage {
        source: EntityId,
        target: EntityId,
        amount: f32,
    },
    GoldEarned {
        entity: EntityId,
        amount: u32,
    },
    XpEarned {
        entity: EntityId,
        amount: u32,
    },
    LevelUp {
        entity: EntityId,
        level: u32,
    },
    ItemPurchased {
        entity: EntityId,
        item_id: u32,
        slot: u8,
    },
    FirstBlood {
        killer: EntityId,
        victim: EntityId,
    },
    MultiKill {
        entity: EntityId,
        kill_count: u32,
    },
}

impl GameEvent {
    /// "Persistent world-change" events: deaths, structure destructions,
    /// first blood, level-ups, item purchases, and ability casts affecting
    /// persistent state.
    pub fn reliability(&self) -> ReliabilityMode {
        match self {
            Self::ChampionKill { .. }
            | Self::TowerDestroyed { .. }
            | Self::NexusDestroyed { .. }
            | Self::FirstBlood { .. }
            | Self::LevelUp { .. }
            | Self::ItemPurchased { .. }
            | Self::AbilityCast { .. } => ReliabilityMode::Reliable,

            Self::BasicAttack { .. }
            | Self::Damage { .. }
            | Self::GoldEarned { .. }
            | Self::XpEarned { .. }
            | Self::MultiKill { .. } => ReliabilityMode::Unreliable,
        }
    }

    /// Entities this event references, used to decide which viewers an
    /// unreliable (vision-gated) event is relevant to.
    pub fn involved_entities(&self) -> Vec<EntityId> {
        match self {
            Self::ChampionKill { killer, victim, assists } => {
                let mut v = vec![*killer, *victim];
                v.extend(assists);
                v
            }
            Self::TowerDestroyed { tower, .. } => vec![*tower],
            Self::NexusDestroyed { nexus, .. } => vec![*nexus],
            Self::AbilityCast { caster, target, .. } => {
                let mut v = vec![*caster];
                if let Some(t) = target {
                    v.push(*t);
                }
                v
            }
            Self::BasicAttack { attacker, target } => vec![*attacker, *target],
            Self::Damage { source, target, .. } => vec![*source, *target],
            Self::GoldEarned { entity, .. }
            | Self::XpEarned { entity, .. }
            | Self::LevelUp { entity, .. }
            | Self::ItemPurchased { entity, .. }
            | Self::MultiKill { entity, .. } => vec![*entity],
            Self::FirstBlood { killer, victim } => vec![*killer, *victim],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliability_classification_matches_persistent_events() {
        assert!(GameEvent::LevelUp { entity: EntityId(1), level: 2 }.reliability().is_reliable());
        assert!(!GameEvent::Damage { source: EntityId(1), target: EntityId(2), amount: 5.0 }
            .reliability()
            .is_reliable());
    }
}
