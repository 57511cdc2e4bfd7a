//! Change-mask bit layout for entity deltas.

use glam::Vec2;

use crate::entity::EntitySnapshot;

bitflags::bitflags! {
    /// One bit per field family of [`crate::entity::EntitySnapshot`]. A
    /// removal delta is represented separately (`StateUpdate.removed`), not
    /// as a bit here, since a removed entity carries no field data at all.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub struct ChangeMask: u16 {
        const POSITION  = 1 << 0;
        const HEALTH    = 1 << 1;
        const RESOURCE  = 1 << 2;
        const LEVEL     = 1 << 3;
        const EFFECTS   = 1 << 4;
        const ABILITIES = 1 << 5;
        const ITEMS     = 1 << 6;
        const TARGET    = 1 << 7;
        const STATE     = 1 << 8;
        const TRINKET   = 1 << 9;
        const GOLD      = 1 << 10;
        const SHIELDS   = 1 << 11;
        const PASSIVE   = 1 << 12;
    }
}

impl ChangeMask {
    pub const FULL: ChangeMask = ChangeMask::from_bits_truncate(0x1FFF);

    /// Bits that, when set, constitute a "critical" change overriding
    /// priority cadence: health crossing thresholds, death, targeting
    /// change. Death rides in `STATE` (the `DEAD` flag).
    pub fn is_critical(self) -> bool {
        self.intersects(ChangeMask::HEALTH | ChangeMask::STATE | ChangeMask::TARGET)
    }
}

const POSITION_EPSILON: f32 = 0.01;

/// Computes the change mask between `prev` (the viewer's baseline) and
/// `current`, with per-field-family epsilon rules: positions compare with a
/// small epsilon, health/resource exact (as `PartialEq` on `f32` — any
/// change at all counts since these are server-authoritative values that
/// don't jitter).
pub fn diff(prev: &crate::entity::EntitySnapshot, current: &crate::entity::EntitySnapshot) -> ChangeMask {
    let mut mask = ChangeMask::empty();
    if prev.position.distance(current.position) > POSITION_EPSILON {
        mask |= ChangeMask::POSITION;
    }
    if prev.health != current.health {
        mask |= ChangeMask::HEALTH;
    }
    if prev.resource != current.resource {
        mask |= ChangeMask::RESOURCE;
    }
    if prev.level != current.level {
        mask |= ChangeMask::LEVEL;
    }
    if prev.effects != current.effects {
        mask |= ChangeMask::EFFECTS;
    }
    if prev.abilities != current.abilities {
        mask |= ChangeMask::ABILITIES;
    }
    if prev.items != current.items {
        mask |= ChangeMask::ITEMS;
    }
    if prev.target != current.target {
        mask |= ChangeMask::TARGET;
    }
    if prev.state != current.state {
        mask |= ChangeMask::STATE;
    }
    if prev.trinket != current.trinket {
        mask |= ChangeMask::TRINKET;
    }
    if prev.gold != current.gold {
        mask |= ChangeMask::GOLD;
    }
    if prev.shields != current.shields {
        mask |= ChangeMask::SHIELDS;
    }
    if prev.passive != current.passive {
        mask |= ChangeMask::PASSIVE;
    }
    mask
}

/// Projects `full` down to only the field families `mask` flags, zeroing
/// (`None`/empty-`Vec`/default) everything else so `data` never carries a
/// field the mask doesn't claim.
pub fn apply(mask: ChangeMask, full: &EntitySnapshot) -> EntitySnapshot {
    EntitySnapshot {
        position: if mask.contains(ChangeMask::POSITION) { full.position } else { Vec2::ZERO },
        health: if mask.contains(ChangeMask::HEALTH) { full.health } else { None },
        resource: if mask.contains(ChangeMask::RESOURCE) { full.resource } else { None },
        level: if mask.contains(ChangeMask::LEVEL) { full.level } else { None },
        effects: if mask.contains(ChangeMask::EFFECTS) { full.effects.clone() } else { Vec::new() },
        abilities: if mask.contains(ChangeMask::ABILITIES) { full.abilities.clone() } else { Vec::new() },
        items: if mask.contains(ChangeMask::ITEMS) { full.items.clone() } else { Vec::new() },
        target: if mask.contains(ChangeMask::TARGET) { full.target } else { None },
        state: if mask.contains(ChangeMask::STATE) { full.state } else { 0 },
        trinket: if mask.contains(ChangeMask::TRINKET) { full.trinket } else { None },
        gold: if mask.contains(ChangeMask::GOLD) { full.gold } else { None },
        shields: if mask.contains(ChangeMask::SHIELDS) { full.shields.clone() } else { Vec::new() },
        passive: if mask.contains(ChangeMask::PASSIVE) { full.passive } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySnapshot;
    use glam::Vec2;

    #[test]
    fn position_within_epsilon_is_not_a_change() {
        let prev = EntitySnapshot::at(Vec2::new(0.0, 0.0));
        let mut current = prev.clone();
        current.position = Vec2::new(0.005, 0.0);
        assert!(diff(&prev, &current).is_empty());
    }

    #[test]
    fn position_past_epsilon_is_a_change() {
        let prev = EntitySnapshot::at(Vec2::new(0.0, 0.0));
        let mut current = prev.clone();
        current.position = Vec2::new(0.02, 0.0);
        assert_eq!(diff(&prev, &current), ChangeMask::POSITION);
    }

    #[test]
    fn health_change_is_critical() {
        use crate::entity::Health;
        let prev = EntitySnapshot::at(Vec2::ZERO);
        let mut current = prev.clone();
        current.health = Some(Health { current: 90.0, max: 100.0 });
        assert!(diff(&prev, &current).is_critical());
    }

    #[test]
    fn unchanged_snapshot_diffs_to_empty() {
        let snap = EntitySnapshot::at(Vec2::new(3.0, 4.0));
        assert!(diff(&snap, &snap).is_empty());
    }

    #[test]
    fn apply_strips_unmasked_field_families() {
        use crate::entity::Health;
        let mut full = EntitySnapshot::at(Vec2::new(1.0, 2.0));
        full.health = Some(Health { current: 10.0, max: 20.0 });
        full.gold = Some(500);

        let data = apply(ChangeMask::HEALTH, &full);
        assert_eq!(data.health, full.health);
        assert_eq!(data.position, Vec2::ZERO);
        assert_eq!(data.gold, None);
    }

    #[test]
    fn apply_with_full_mask_is_identity() {
        use crate::entity::Health;
        let mut full = EntitySnapshot::at(Vec2::new(1.0, 2.0));
        full.health = Some(Health { current: 10.0, max: 20.0 });
        full.gold = Some(500);
        full.state = 7;

        assert_eq!(apply(ChangeMask::FULL, &full), full);
    }
}
