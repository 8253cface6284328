//! # Kernel Error Types
//!
//! All errors that can occur inside the simulation kernel.
//!
//! Contract violations (host-code defects) each get their own variant so
//! the diagnostic names the invariant that was broken. Missing lookups are
//! never errors: they are `Option`s on the query APIs.

use thiserror::Error;

use crate::entity::EntityId;
use crate::player::PlayerId;

/// Errors that can occur in the simulation kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// `set_players` was called after players were already fixed.
    #[error("players are fixed once they have been set")]
    PlayersAlreadySet,

    /// The local player handed to `set_players` is not one of the players.
    #[error("local player {0} must be one of the players in the world")]
    LocalPlayerNotInSession(PlayerId),

    /// A player id does not belong to this session.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// Tried to remove an entity that is not in the world.
    #[error("entity {0} is not in the world")]
    EntityNotInWorld(EntityId),

    /// Tried to add an entity that is already in the world.
    #[error("entity {0} is already in the world")]
    EntityAlreadyInWorld(EntityId),

    /// The entity does not exist (never created, or already disposed).
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),

    /// Registry or capability index mutated while the scheduler iterates it.
    #[error("{operation} during tick dispatch; defer it with run_at_frame_end")]
    StructuralMutationDuringDispatch {
        /// The rejected operation.
        operation: &'static str,
    },

    /// A trait instance was borrowed re-entrantly (it is currently running).
    #[error("trait {trait_name} of entity {entity} is already running")]
    TraitInUse {
        /// Owning entity.
        entity: EntityId,
        /// Trait name.
        trait_name: &'static str,
    },

    /// A trait handle refers to a slot that has since been reused.
    #[error("trait handle is stale")]
    StaleTraitHandle,

    /// Every entity id of the session has been handed out.
    #[error("entity id space exhausted")]
    EntityIdsExhausted,

    /// No type definition for the requested entity type.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// A trait requires another trait the entity type does not declare.
    #[error("{entity_type}: trait {trait_name} requires {requires}, which is not declared")]
    MissingTraitDependency {
        /// Entity type being registered.
        entity_type: String,
        /// Trait with the unmet requirement.
        trait_name: String,
        /// Name of the missing trait.
        requires: String,
    },

    /// Trait requirements of an entity type form a cycle.
    #[error("{entity_type}: trait requirements form a cycle")]
    TraitDependencyCycle {
        /// Entity type being registered.
        entity_type: String,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Gameplay code reported a failure from inside a hook.
    #[error("trait {trait_name} of entity {entity} failed: {reason}")]
    TraitFailed {
        /// Owning entity.
        entity: EntityId,
        /// Trait name.
        trait_name: &'static str,
        /// Failure description.
        reason: String,
    },

    /// A transient effect reported a failure.
    #[error("effect {effect} failed: {reason}")]
    EffectFailed {
        /// Effect name.
        effect: &'static str,
        /// Failure description.
        reason: String,
    },

    /// The world is being disposed or has been disposed.
    #[error("world has been disposed")]
    WorldDisposed,

    /// A previous tick failed; the simulation no longer advances.
    #[error("simulation halted: {0}")]
    SimulationHalted(String),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
