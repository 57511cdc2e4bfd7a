//! Error taxonomy for the match core.
//!
//! Most of these never reach a client: the simulation records and continues
//! rather than propagating. `InvariantViolation` is the sole kind the match
//! loop treats as terminal.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input from player {player}: {reason}")]
    InvalidInput { player: u32, reason: String },

    #[error("target {target:?} no longer valid for entity {source:?}")]
    TargetNoLongerValid {
        source: crate::entity::EntityId,
        target: crate::entity::EntityId,
    },

    #[error("rule rejected: {reason}")]
    RuleRejection { reason: String },

    #[error("entity {entity:?} update panicked: {detail}")]
    EntityCrash {
        entity: crate::entity::EntityId,
        detail: String,
    },

    #[error("invariant violated: {detail}")]
    InvariantViolation { detail: String },

    #[error("network drop: no ack from player {player} for event {event_id}")]
    NetworkDrop { player: u32, event_id: u64 },
}
