//! Per-team fog-of-war grid.
//!
//! Recomputation is driven by a handful of sighted entities, not by walking
//! the whole grid: each sight source only touches the cells inside its own
//! radius, so cost is linear in (sighted entities × cells per radius).
//! `explored` persists for the whole match; `visible` is rebuilt fresh every
//! tick and folded into `explored` before being dropped.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::entity::{Entity, EntityId, Side};
use crate::sim::EntityRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Unexplored,
    Explored,
    Visible,
}

type Cell = (i32, i32);

/// One team's grid. Cell size is shared across teams.
#[derive(Debug)]
struct VisibilityGrid {
    cell_size: f32,
    visible: HashSet<Cell>,
    explored: HashSet<Cell>,
}

impl VisibilityGrid {
    fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            visible: HashSet::new(),
            explored: HashSet::new(),
        }
    }

    fn cell_of(&self, position: Vec2) -> Cell {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_center(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            (cell.0 as f32 + 0.5) * self.cell_size,
            (cell.1 as f32 + 0.5) * self.cell_size,
        )
    }

    fn recompute(&mut self, sight_sources: impl Iterator<Item = (Vec2, f32)>) {
        self.visible.clear();
        for (position, radius) in sight_sources {
            if radius <= 0.0 {
                continue;
            }
            let min_cell = self.cell_of(position - Vec2::splat(radius));
            let max_cell = self.cell_of(position + Vec2::splat(radius));
            for cx in min_cell.0..=max_cell.0 {
                for cy in min_cell.1..=max_cell.1 {
                    let cell = (cx, cy);
                    // Boundary is inclusive: exactly-at-radius counts as visible.
                    if self.cell_center(cell).distance(position) <= radius {
                        self.visible.insert(cell);
                    }
                }
            }
        }
        self.explored.extend(self.visible.iter().copied());
    }

    fn state(&self, position: Vec2) -> CellState {
        let cell = self.cell_of(position);
        if self.visible.contains(&cell) {
            CellState::Visible
        } else if self.explored.contains(&cell) {
            CellState::Explored
        } else {
            CellState::Unexplored
        }
    }

    fn is_visible(&self, position: Vec2) -> bool {
        self.visible.contains(&self.cell_of(position))
    }
}

/// Owns one [`VisibilityGrid`] per side and answers the per-team visibility
/// queries: `isVisible`/`visibleEntities`, with the stealth/true-sight
/// override.
pub struct VisibilitySystem {
    grids: HashMap<Side, VisibilityGrid>,
    cell_size: f32,
}

impl VisibilitySystem {
    pub fn new(cell_size: f32) -> Self {
        let mut grids = HashMap::new();
        grids.insert(Side::A, VisibilityGrid::new(cell_size));
        grids.insert(Side::B, VisibilityGrid::new(cell_size));
        Self { grids, cell_size }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Recomputes `side`'s grid from the positions/radii of its living
    /// sight sources (champions, wards, etc.) this tick.
    pub fn recompute(&mut self, side: Side, sight_sources: impl Iterator<Item = (Vec2, f32)>) {
        self.grids.entry(side).or_insert_with(|| VisibilityGrid::new(self.cell_size)).recompute(sight_sources);
    }

    pub fn cell_state(&self, side: Side, position: Vec2) -> CellState {
        self.grids.get(&side).map_or(CellState::Unexplored, |g| g.state(position))
    }

    pub fn is_visible(&self, side: Side, position: Vec2) -> bool {
        self.grids.get(&side).is_some_and(|g| g.is_visible(position))
    }

    /// Every entity visible to `side`: inside a visible cell, and either not
    /// true-sight-gated or collocated with one of `side`'s true-sight
    /// sources (entities with `provides_true_sight` set, typically control
    /// wards — not just any ally within vision range).
    pub fn visible_entities(&self, side: Side, registry: &EntityRegistry) -> Vec<EntityId> {
        let true_sight_sources: Vec<(Vec2, f32)> = registry
            .iter()
            .filter(|e| e.alive && e.side == Some(side) && e.provides_true_sight)
            .map(|e: &Entity| (e.position, e.sight_radius))
            .collect();

        registry
            .iter()
            .filter(|e| self.is_visible(side, e.position))
            .filter(|e| {
                !e.requires_true_sight
                    || true_sight_sources.iter().any(|(pos, radius)| e.position.distance(*pos) <= *radius)
            })
            .map(|e| e.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    #[test]
    fn explored_never_reverts_to_unexplored() {
        let mut vis = VisibilitySystem::new(100.0);
        vis.recompute(Side::A, std::iter::once((Vec2::new(0.0, 0.0), 600.0)));
        assert_eq!(vis.cell_state(Side::A, Vec2::ZERO), CellState::Visible);

        vis.recompute(Side::A, std::iter::empty());
        assert_eq!(vis.cell_state(Side::A, Vec2::ZERO), CellState::Explored);
    }

    #[test]
    fn boundary_distance_is_visible() {
        let mut vis = VisibilitySystem::new(50.0);
        vis.recompute(Side::A, std::iter::once((Vec2::new(0.0, 0.0), 600.0)));
        assert!(vis.is_visible(Side::A, Vec2::new(600.0, 0.0)));
        assert!(!vis.is_visible(Side::A, Vec2::new(601.0, 0.0)));
    }

    #[test]
    fn true_sight_gates_stealthed_entities() {
        let mut registry = EntityRegistry::new(50.0);
        let ally = registry.spawn(|id| {
            let mut e = Entity::new(id, EntityKind::Champion, Some(Side::A), Vec2::ZERO);
            e.sight_radius = 600.0;
            e
        });
        let stealthed = registry.spawn(|id| {
            let mut e = Entity::new(id, EntityKind::Champion, Some(Side::B), Vec2::new(100.0, 0.0));
            e.requires_true_sight = true;
            e
        });
        let _ = ally;

        let mut vis = VisibilitySystem::new(50.0);
        vis.recompute(Side::A, registry.iter().filter(|e| e.side == Some(Side::A)).map(|e| (e.position, e.sight_radius)));

        assert!(!vis.visible_entities(Side::A, &registry).contains(&stealthed));

        // A true-sight ward owned by side A, collocated with the stealthed unit.
        let _ward = registry.spawn(|id| {
            let mut w = Entity::new(id, EntityKind::Ward, Some(Side::A), Vec2::new(100.0, 0.0));
            w.sight_radius = 200.0;
            w.provides_true_sight = true;
            w
        });
        assert!(vis.visible_entities(Side::A, &registry).contains(&stealthed));
    }
}
