//! EntityRegistry and its spatial-hash backing.

use std::collections::HashMap;

use glam::Vec2;

use crate::entity::{Entity, EntityId, EntityKind};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("entity id {0:?} already in use")]
    DuplicateId(EntityId),
}

/// Uniform-grid spatial hash over entity positions. Cell size should be
/// chosen to match the typical query radius; entities that cross a cell
/// boundary are rewired in place rather than the grid being rebuilt.
#[derive(Debug)]
pub struct SpatialHash {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<EntityId>>,
    entity_cell: HashMap<EntityId, (i32, i32)>,
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "spatial hash cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            entity_cell: HashMap::new(),
        }
    }

    fn cell_of(&self, position: Vec2) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: EntityId, position: Vec2) {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push(id);
        self.entity_cell.insert(id, cell);
    }

    pub fn remove(&mut self, id: EntityId) {
        if let Some(cell) = self.entity_cell.remove(&id) {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.retain(|e| *e != id);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    /// Re-files `id` if it crossed into a new cell since its last known
    /// position. No-op (and no allocation) otherwise.
    pub fn update(&mut self, id: EntityId, position: Vec2) {
        let new_cell = self.cell_of(position);
        match self.entity_cell.get(&id) {
            Some(&old_cell) if old_cell == new_cell => {}
            _ => {
                self.remove(id);
                self.insert(id, position);
            }
        }
    }

    pub fn query(&self, point: Vec2, radius: f32, positions: &HashMap<EntityId, Vec2>) -> Vec<EntityId> {
        let min_cell = self.cell_of(point - Vec2::splat(radius));
        let max_cell = self.cell_of(point + Vec2::splat(radius));
        let radius_sq = radius * radius;

        let mut out = Vec::new();
        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &id in bucket {
                    if let Some(&pos) = positions.get(&id) {
                        if point.distance_squared(pos) <= radius_sq {
                            out.push(id);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cell.clear();
    }
}

/// Stores entities keyed by opaque, monotonically allocated IDs.
pub struct EntityRegistry {
    entities: HashMap<EntityId, Entity>,
    insertion_order: Vec<EntityId>,
    next_id: u32,
    spatial: SpatialHash,
    removed_this_tick: Vec<EntityId>,
}

impl EntityRegistry {
    pub fn new(spatial_cell_size: f32) -> Self {
        Self {
            entities: HashMap::new(),
            insertion_order: Vec::new(),
            next_id: 1,
            spatial: SpatialHash::new(spatial_cell_size),
            removed_this_tick: Vec::new(),
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Assigns a fresh ID and inserts `make(id)`'s result.
    pub fn spawn(&mut self, make: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.allocate_id();
        let entity = make(id);
        self.spatial.insert(id, entity.position);
        self.insertion_order.push(id);
        self.entities.insert(id, entity);
        id
    }

    /// Inserts a pre-built entity; fails if its ID is already occupied.
    pub fn add(&mut self, entity: Entity) -> Result<(), RegistryError> {
        if self.entities.contains_key(&entity.id) {
            return Err(RegistryError::DuplicateId(entity.id));
        }
        self.spatial.insert(entity.id, entity.position);
        self.insertion_order.push(entity.id);
        self.next_id = self.next_id.max(entity.id.0 + 1);
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    /// Idempotent: removing an absent or already-removed id is a no-op.
    pub fn remove(&mut self, id: EntityId) {
        if self.entities.remove(&id).is_some() {
            self.spatial.remove(id);
            self.insertion_order.retain(|e| *e != id);
            self.removed_this_tick.push(id);
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Iteration order matches insertion order, stable within a tick.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.insertion_order.iter().filter_map(|id| self.entities.get(id))
    }

    pub fn by_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.iter().filter(move |e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Must be called after any entity's `position` is mutated so the
    /// spatial hash stays in sync.
    pub fn sync_position(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get(&id) {
            self.spatial.update(id, entity.position);
        }
    }

    pub fn spatial_query(&self, point: Vec2, radius: f32) -> Vec<EntityId> {
        let positions: HashMap<EntityId, Vec2> =
            self.entities.iter().map(|(id, e)| (*id, e.position)).collect();
        self.spatial.query(point, radius, &positions)
    }

    /// Drains and returns the IDs removed since the last call; called once
    /// per tick by the orchestrator to emit removal events.
    pub fn drain_removed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.removed_this_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Side;

    #[test]
    fn spatial_query_finds_within_radius() {
        let mut reg = EntityRegistry::new(50.0);
        let a = reg.spawn(|id| Entity::new(id, EntityKind::Champion, Some(Side::A), Vec2::new(0.0, 0.0)));
        let _b = reg.spawn(|id| Entity::new(id, EntityKind::Champion, Some(Side::B), Vec2::new(1000.0, 0.0)));

        let found = reg.spatial_query(Vec2::ZERO, 10.0);
        assert_eq!(found, vec![a]);
    }

    #[test]
    fn spatial_hash_rewires_on_move() {
        let mut reg = EntityRegistry::new(50.0);
        let a = reg.spawn(|id| Entity::new(id, EntityKind::Champion, Some(Side::A), Vec2::new(0.0, 0.0)));

        if let Some(e) = reg.get_mut(a) {
            e.position = Vec2::new(500.0, 500.0);
        }
        reg.sync_position(a);

        assert!(reg.spatial_query(Vec2::ZERO, 10.0).is_empty());
        assert_eq!(reg.spatial_query(Vec2::new(500.0, 500.0), 10.0), vec![a]);
    }

    #[test]
    fn remove_is_idempotent_and_queues_event() {
        let mut reg = EntityRegistry::new(50.0);
        let a = reg.spawn(|id| Entity::new(id, EntityKind::Minion, None, Vec2::ZERO));

        reg.remove(a);
        reg.remove(a);

        assert!(reg.get(a).is_none());
        assert_eq!(reg.drain_removed(), vec![a]);
        assert!(reg.drain_removed().is_empty());
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let mut reg = EntityRegistry::new(50.0);
        let id = reg.allocate_id();
        let e1 = Entity::new(id, EntityKind::Ward, None, Vec2::ZERO);
        let e2 = Entity::new(id, EntityKind::Ward, None, Vec2::ZERO);

        reg.add(e1).unwrap();
        assert!(matches!(reg.add(e2), Err(RegistryError::DuplicateId(_))));
    }

    #[test]
    fn iteration_order_is_insertion_order() {
        let mut reg = EntityRegistry::new(50.0);
        let a = reg.spawn(|id| Entity::new(id, EntityKind::Minion, None, Vec2::ZERO));
        let b = reg.spawn(|id| Entity::new(id, EntityKind::Minion, None, Vec2::ZERO));
        let c = reg.spawn(|id| Entity::new(id, EntityKind::Minion, None, Vec2::ZERO));

        let order: Vec<_> = reg.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
