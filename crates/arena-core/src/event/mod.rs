pub mod bus;
pub mod reliable;
pub mod types;

pub use bus::EventBus;
pub use reliable::{PendingReliableEvent, ReliableEventQueue};
pub use types::{EventId, GameEvent, ReliabilityMode};
