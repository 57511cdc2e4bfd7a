pub mod entity;
pub mod error;
pub mod event;
pub mod input;
pub mod match_;
pub mod net;
pub mod registry;
pub mod sim;
pub mod snapshot;
pub mod visibility;

pub use entity::{
    AbilityState, Baseline, EffectInstance, Entity, EntityId, EntityKind, EntitySnapshot, Health,
    ItemState, LevelInfo, PassiveState, Resource, ShieldInstance, Side, StateFlags, TrinketState,
};
pub use error::CoreError;
pub use event::{EventBus, EventId, GameEvent, PendingReliableEvent, ReliabilityMode, ReliableEventQueue};
pub use input::{ClientInput, InputEnvelope, InputPipeline};
pub use match_::{
    EntityAssignment, InboundMessage, Match, MatchConfig, MatchState, OutboundMessage, OutboundSink,
    PlayerId,
};
pub use net::{
    ArchivedPacket, ClientConnection, ConnectionManager, ConnectionState, DEFAULT_PORT,
    DEFAULT_TICK_RATE, MAX_PACKET_SIZE, NetworkEndpoint, NetworkStats, Packet, PacketError,
    PacketHeader, PacketLossSimulation, PacketType, sequence_greater_than,
};
pub use registry::{MatchHandle, MatchId, MatchRegistry};
pub use sim::{EntityRegistry, FixedClock, RegistryError, RulesCatalogue, SimContext, Simulation, SpatialHash};
pub use snapshot::{
    ChangeMask, EntityDelta, EntityPrioritizer, FullStateSnapshot, PriorityConfig,
    SnapshotSerializer, StateUpdate, Tier, ViewerState,
};
pub use visibility::{CellState, VisibilitySystem};
