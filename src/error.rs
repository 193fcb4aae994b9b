//! Error types.
//!
//! `SolverError` covers everything the tour engine itself can report.
//! `DatasetError` is raised while loading or validating scenario data.

use crate::instance::{City, ScenarioId};
use thiserror::Error;

/// Errors raised by the distance model, the sale lookup and the solvers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("unknown city: {0}")]
    UnknownCity(City),
    #[error("unknown scenario: {0}")]
    UnknownScenario(ScenarioId),
    #[error("scenario {scenario} is unsatisfiable: {reason}")]
    UnsatisfiableConstraints { scenario: ScenarioId, reason: String },
    #[error("no solution found for scenario {0}")]
    NoSolutionFound(ScenarioId),
    #[error("scenario {scenario} has {stops} stops, search is limited to {max}")]
    ScenarioTooLarge {
        scenario: ScenarioId,
        stops: usize,
        max: usize,
    },
}

/// Errors raised while reading, building or validating a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot access dataset file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid dataset json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("distance row for {city} has {found} entries, expected {expected}")]
    MalformedMatrix {
        city: City,
        found: usize,
        expected: usize,
    },
    #[error("city {0} is listed twice in the distance matrix")]
    DuplicateCity(City),
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    #[error("unknown member: {0}")]
    UnknownMember(String),
    #[error("invalid scenario {scenario}: {reason}")]
    InvalidScenario { scenario: ScenarioId, reason: String },
    #[error(transparent)]
    Solver(#[from] SolverError),
}

pub type Result<T, E = SolverError> = std::result::Result<T, E>;
