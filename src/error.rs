//! Typed errors for the allocation engine.
//!
//! - `EngineError`: what callers of [`crate::engine::Engine`] see
//! - `StoreError`: persistence failures, including optimistic version conflicts
//! - `ScopeError`: a scope that does not fit its project or parent assignment

use thiserror::Error;
use uuid::Uuid;

use crate::models::Entity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope is empty")]
    Empty,

    #[error("division '{0}' is not in the project catalog")]
    UnknownDivision(String),

    #[error("part '{0}' is not in the project catalog")]
    UnknownPart(String),

    #[error("work type '{0}' is not in the project catalog")]
    UnknownWorkType(String),

    #[error("unit {0} is outside the parent assignment scope")]
    OutsideParent(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: Entity, id: Uuid },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id}: cannot {event} from {from}: {reason}")]
    InvalidTransition {
        entity: Entity,
        id: Uuid,
        from: String,
        event: &'static str,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("{entity} {id} was modified concurrently, retry the request")]
    ConcurrentModification { entity: Entity, id: Uuid },

    #[error("invalid scope: {0}")]
    InvalidScope(#[from] ScopeError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("completion time edits are disabled by policy")]
    TimeEditDisabled,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::ConcurrentModification { entity, id } => {
                Self::ConcurrentModification { entity, id }
            }
            other => Self::Store(other),
        }
    }
}
