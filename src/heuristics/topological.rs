//! Feasible tour from a linear extension of the constraint graph.
//!
//! Kahn's algorithm over stops: the FIFO ready-queue is seeded in stop
//! order (first appearance in the sale list), which makes the result
//! reproducible. The tour is feasible but not optimised for distance.

use super::TourSolver;
use crate::error::{Result, SolverError};
use crate::graph::ConstraintGraph;
use crate::instance::{DistanceProvider, Scenario};
use crate::solution::TourSolution;
use std::collections::VecDeque;

/// Kahn's algorithm on the stop graph.
///
/// Returns the stops in a precedence-respecting order. When the graph has a
/// cycle, the stops on or behind it are missing from the result.
pub fn kahn_order(graph: &ConstraintGraph) -> Vec<usize> {
    let n = graph.stops().len();
    let mut in_degree: Vec<usize> = (0..n).map(|s| graph.in_degree(s)).collect();
    let mut ready: VecDeque<usize> = (0..n).filter(|&s| in_degree[s] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(stop) = ready.pop_front() {
        order.push(stop);
        for &next in graph.successors(stop) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    order
}

pub struct TopologicalSolver;

impl TopologicalSolver {
    pub fn new() -> Self {
        TopologicalSolver
    }
}

impl Default for TopologicalSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TourSolver for TopologicalSolver {
    fn solve(&self, scenario: &Scenario, distances: &dyn DistanceProvider) -> Result<TourSolution> {
        let start = std::time::Instant::now();
        let graph = ConstraintGraph::from_sales(scenario.well_formed_sales());

        let order = kahn_order(&graph);
        if order.len() < graph.stops().len() {
            let blocked: Vec<String> = (0..graph.stops().len())
                .filter(|s| !order.contains(s))
                .map(|s| graph.stops()[s].city.to_string())
                .collect();
            return Err(SolverError::UnsatisfiableConstraints {
                scenario: scenario.id,
                reason: format!("precedence cycle through {}", blocked.join(", ")),
            });
        }

        debug_assert!(graph.respects_precedence(&graph.vertex_order(&order)));

        let cities = order.iter().map(|&s| graph.stops()[s].city.clone());
        let mut solution =
            TourSolution::from_stops(scenario.id, &scenario.depot, cities, distances, self.name())?;
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        "Topological"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{City, DistanceMatrix, Sale};

    fn matrix() -> DistanceMatrix {
        let cities: Vec<City> = ["Depot", "A", "B", "C", "D"].map(City::from).to_vec();
        let rows = vec![
            vec![0, 2, 4, 3, 5],
            vec![2, 0, 3, 4, 6],
            vec![4, 3, 0, 2, 4],
            vec![3, 4, 2, 0, 3],
            vec![5, 6, 4, 3, 0],
        ];
        DistanceMatrix::from_rows(cities, rows).unwrap()
    }

    fn position(solution: &TourSolution, city: &str) -> usize {
        solution
            .visit_order
            .iter()
            .position(|c| c.name() == city)
            .unwrap()
    }

    #[test]
    fn test_precedence_respected() {
        let scenario = Scenario::new(1, "Depot", vec![Sale::new("A", "B"), Sale::new("C", "D")]);
        let solution = TopologicalSolver::new().solve(&scenario, &matrix()).unwrap();

        assert_eq!(solution.visit_order.first().unwrap().name(), "Depot");
        assert_eq!(solution.visit_order.last().unwrap().name(), "Depot");
        assert!(position(&solution, "A") < position(&solution, "B"));
        assert!(position(&solution, "C") < position(&solution, "D"));
        // Kahn seeds A and C first, in sale order
        let names: Vec<&str> = solution.visit_order.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["Depot", "A", "C", "B", "D", "Depot"]);
        assert!(solution.is_consistent(&scenario.depot, &matrix()).unwrap());
    }

    #[test]
    fn test_chain_through_fused_city() {
        let scenario = Scenario::new(2, "Depot", vec![Sale::new("B", "C"), Sale::new("A", "B")]);
        let solution = TopologicalSolver::new().solve(&scenario, &matrix()).unwrap();
        let names: Vec<&str> = solution.visit_order.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["Depot", "A", "B", "C", "Depot"]);
    }

    #[test]
    fn test_cycle_is_unsatisfiable() {
        let scenario = Scenario::new(7, "Depot", vec![Sale::new("A", "B"), Sale::new("B", "A")]);
        let err = TopologicalSolver::new().solve(&scenario, &matrix()).unwrap_err();
        assert!(matches!(err, SolverError::UnsatisfiableConstraints { scenario: 7, .. }));
    }

    #[test]
    fn test_empty_scenario_is_depot_only() {
        let scenario = Scenario::new(0, "Depot", Vec::new());
        let solution = TopologicalSolver::new().solve(&scenario, &matrix()).unwrap();
        assert_eq!(solution.visit_order.len(), 2);
        assert_eq!(solution.total_distance, 0);
    }

    #[test]
    fn test_unknown_city() {
        let scenario = Scenario::new(0, "Depot", vec![Sale::new("A", "Nantes")]);
        let err = TopologicalSolver::new().solve(&scenario, &matrix()).unwrap_err();
        assert_eq!(err, SolverError::UnknownCity(City::from("Nantes")));
    }
}
