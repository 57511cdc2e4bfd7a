pub mod change_mask;
pub mod priority;
pub mod serializer;

pub use change_mask::ChangeMask;
pub use priority::{EntityPrioritizer, PriorityConfig, Tier};
pub use serializer::{EntityDelta, FullStateSnapshot, SnapshotSerializer, StateUpdate, ViewerState};
