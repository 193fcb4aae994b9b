//! Nearest-obligation greedy tour.
//!
//! Starting at the depot, repeatedly travel to the closest city where an
//! open obligation can be served: the vendor of a sale whose card has not
//! been picked up yet, or the buyer of a sale whose card is on board.
//! A single deterministic pass with no backtracking; cities may be visited
//! more than once.

use super::TourSolver;
use crate::error::{Result, SolverError};
use crate::instance::{City, Distance, DistanceProvider, Scenario};
use crate::solution::TourSolution;
use std::collections::HashSet;

pub struct GreedySolver;

impl GreedySolver {
    pub fn new() -> Self {
        GreedySolver
    }
}

impl Default for GreedySolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TourSolver for GreedySolver {
    fn solve(&self, scenario: &Scenario, distances: &dyn DistanceProvider) -> Result<TourSolution> {
        let start = std::time::Instant::now();
        let sales = scenario.well_formed_sales();

        let mut picked: HashSet<&City> = HashSet::new();
        let mut delivered = vec![false; sales.len()];
        let mut remaining = sales.len();
        let mut current = &scenario.depot;
        let mut stops: Vec<City> = Vec::new();

        // Every move either picks up at a new vendor city or delivers at
        // least one sale.
        let max_moves = 2 * sales.len();

        while remaining > 0 {
            if stops.len() >= max_moves {
                return Err(SolverError::UnsatisfiableConstraints {
                    scenario: scenario.id,
                    reason: format!("no progress after {} moves", stops.len()),
                });
            }

            let mut next: Option<(&City, Distance)> = None;
            for (i, sale) in sales.iter().enumerate() {
                if delivered[i] {
                    continue;
                }
                let target = if picked.contains(&sale.vendor) {
                    &sale.buyer
                } else {
                    &sale.vendor
                };
                let d = distances.distance(current, target)?;
                if next.map_or(true, |(_, best)| d < best) {
                    next = Some((target, d));
                }
            }

            let Some((city, _)) = next else {
                return Err(SolverError::UnsatisfiableConstraints {
                    scenario: scenario.id,
                    reason: format!("no feasible next step from {}", current),
                });
            };

            current = city;
            stops.push(city.clone());

            for (i, sale) in sales.iter().enumerate() {
                if sale.vendor == *current {
                    picked.insert(&sale.vendor);
                } else if sale.buyer == *current && !delivered[i] && picked.contains(&sale.vendor) {
                    delivered[i] = true;
                    remaining -= 1;
                }
            }
        }

        let mut solution =
            TourSolution::from_stops(scenario.id, &scenario.depot, stops, distances, self.name())?;
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        "Greedy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{DistanceMatrix, Sale};

    /// Cities on a line: Depot=0, A=1, B=5, C=2, D=6.
    fn line_matrix() -> DistanceMatrix {
        let names = ["Depot", "A", "B", "C", "D"];
        let pos = [0i64, 1, 5, 2, 6];
        let rows = pos
            .iter()
            .map(|a| pos.iter().map(|b| (a - b).unsigned_abs()).collect())
            .collect();
        DistanceMatrix::from_rows(names.map(City::from).to_vec(), rows).unwrap()
    }

    fn names(solution: &TourSolution) -> Vec<&str> {
        solution.visit_order.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_nearest_obligation_first() {
        let scenario = Scenario::new(1, "Depot", vec![Sale::new("A", "B"), Sale::new("C", "D")]);
        let solution = GreedySolver::new().solve(&scenario, &line_matrix()).unwrap();

        assert_eq!(names(&solution), ["Depot", "A", "C", "B", "D", "Depot"]);
        assert_eq!(solution.total_distance, 1 + 1 + 3 + 1 + 6);
    }

    #[test]
    fn test_tie_broken_by_sale_order() {
        // A and C are both 1 away from the depot
        let names_ = ["Depot", "A", "B", "C", "D"];
        let pos = [0i64, 1, 4, -1, -4];
        let rows = pos
            .iter()
            .map(|a| pos.iter().map(|b| (a - b).unsigned_abs()).collect())
            .collect();
        let matrix = DistanceMatrix::from_rows(names_.map(City::from).to_vec(), rows).unwrap();

        let scenario = Scenario::new(1, "Depot", vec![Sale::new("C", "D"), Sale::new("A", "B")]);
        let solution = GreedySolver::new().solve(&scenario, &matrix).unwrap();
        assert_eq!(solution.visit_order[1].name(), "C");
    }

    #[test]
    fn test_revisits_when_needed() {
        let scenario = Scenario::new(3, "Depot", vec![Sale::new("A", "B"), Sale::new("B", "A")]);
        let solution = GreedySolver::new().solve(&scenario, &line_matrix()).unwrap();
        assert_eq!(names(&solution), ["Depot", "A", "B", "A", "Depot"]);
    }

    #[test]
    fn test_vendor_at_depot() {
        let scenario = Scenario::new(4, "Depot", vec![Sale::new("Depot", "A")]);
        let solution = GreedySolver::new().solve(&scenario, &line_matrix()).unwrap();
        assert_eq!(names(&solution), ["Depot", "A", "Depot"]);
        assert_eq!(solution.total_distance, 2);
    }

    #[test]
    fn test_empty_scenario() {
        let scenario = Scenario::new(0, "Depot", Vec::new());
        let solution = GreedySolver::new().solve(&scenario, &line_matrix()).unwrap();
        assert_eq!(names(&solution), ["Depot", "Depot"]);
        assert_eq!(solution.total_distance, 0);
    }

    #[test]
    fn test_unknown_city() {
        let scenario = Scenario::new(0, "Depot", vec![Sale::new("A", "Brest")]);
        let err = GreedySolver::new().solve(&scenario, &line_matrix()).unwrap_err();
        assert_eq!(err, SolverError::UnknownCity(City::from("Brest")));
    }
}
