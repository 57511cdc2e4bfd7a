pub mod clock;
pub mod registry;
pub mod simulation;

pub use clock::FixedClock;
pub use registry::{EntityRegistry, RegistryError, SpatialHash};
pub use simulation::{RulesCatalogue, SimContext, Simulation};
