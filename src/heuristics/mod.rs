//! Single-tour solvers and the trait shared by every solver.

pub mod greedy;
pub mod topological;

pub use greedy::GreedySolver;
pub use topological::{kahn_order, TopologicalSolver};

use crate::error::Result;
use crate::instance::{DistanceProvider, Scenario};
use crate::solution::TourSolution;

/// A solver producing one tour for a scenario.
pub trait TourSolver {
    fn solve(&self, scenario: &Scenario, distances: &dyn DistanceProvider) -> Result<TourSolution>;
    fn name(&self) -> &str;
}
