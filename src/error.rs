//! Error types shared by the planner, the lifecycle controller and the
//! store/directions collaborators.

use jiff::civil::Date;
use thiserror::Error;

use crate::model::{RouteId, ScheduleId};

/// Failure reported by a [`Store`](crate::traits::Store) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: i64 },
}

/// Which write of `create_schedule` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    Schedule,
    Routes,
    Assignments,
}

impl std::fmt::Display for PersistStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PersistStage::Schedule => "schedule",
            PersistStage::Routes => "routes",
            PersistStage::Assignments => "assignments",
        };
        f.write_str(name)
    }
}

/// Entities written before a persistence failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedEntities {
    pub schedule: Option<ScheduleId>,
    pub routes: Vec<RouteId>,
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no unassigned bins for {date}")]
    NoWorkAvailable { date: Date },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot {event} {entity} {id} while it is {from}")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        from: String,
        event: &'static str,
    },

    #[error(
        "failed to persist {stage} ({unassigned_bins} bins left unassigned, rolled back: {rolled_back}): {source}"
    )]
    Persistence {
        stage: PersistStage,
        persisted: PersistedEntities,
        rolled_back: bool,
        unassigned_bins: usize,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A status string outside the closed set of known statuses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown status {0:?}")]
pub struct UnknownStatus(pub String);

/// Failure of the driving-directions lookup.
#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("directions request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("directions service returned no route: {0}")]
    NoRoute(String),

    #[error("a driving path needs at least two points")]
    TooFewPoints,
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
