//! Tour solutions and bounded, ranked solution sets.

use crate::error::Result;
use crate::instance::{City, Distance, DistanceProvider, ScenarioId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A depot-to-depot tour for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourSolution {
    pub scenario_id: ScenarioId,
    /// Visited cities, depot first and last, no two consecutive duplicates.
    pub visit_order: Vec<City>,
    pub total_distance: Distance,
    /// Algorithm that produced this tour
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
}

impl TourSolution {
    /// Build a tour from the sequence of stops visited between the two
    /// depot passages.
    ///
    /// Consecutive identical cities are collapsed into one stop, including
    /// a first or last stop located at the depot itself.
    pub fn from_stops<I>(
        scenario_id: ScenarioId,
        depot: &City,
        stops: I,
        distances: &dyn DistanceProvider,
        algorithm: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = City>,
    {
        let visit_order = close_tour(depot, stops);
        let total_distance = tour_distance(&visit_order, distances)?;
        Ok(TourSolution {
            scenario_id,
            visit_order,
            total_distance,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
        })
    }

    pub fn depot(&self) -> Option<&City> {
        self.visit_order.first()
    }

    /// Cities visited between the leading and the trailing depot. Two tours
    /// with the same key are the same solution.
    pub fn dedup_key(&self) -> &[City] {
        let n = self.visit_order.len();
        if n < 2 {
            &[]
        } else {
            &self.visit_order[1..n - 1]
        }
    }

    /// Recompute the distance from `visit_order` and check it against the
    /// stored value, along with the depot at both ends.
    pub fn is_consistent(&self, depot: &City, distances: &dyn DistanceProvider) -> Result<bool> {
        let closed =
            self.visit_order.first() == Some(depot) && self.visit_order.last() == Some(depot);
        Ok(closed && tour_distance(&self.visit_order, distances)? == self.total_distance)
    }
}

impl std::fmt::Display for TourSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scenario {} ({})", self.scenario_id, self.algorithm)?;
        let names: Vec<&str> = self.visit_order.iter().map(|c| c.name()).collect();
        writeln!(f, "  Tour: {}", names.join(" -> "))?;
        writeln!(f, "  Distance: {} km", self.total_distance)?;
        write!(f, "  Time: {:.4}s", self.computation_time)
    }
}

/// Prepend and append the depot, collapsing consecutive duplicates.
///
/// An empty stop sequence yields `[depot, depot]`.
pub fn close_tour<I>(depot: &City, stops: I) -> Vec<City>
where
    I: IntoIterator<Item = City>,
{
    let mut tour = vec![depot.clone()];
    for city in stops {
        if tour.last() != Some(&city) {
            tour.push(city);
        }
    }
    if tour.len() == 1 || tour.last() != Some(depot) {
        tour.push(depot.clone());
    }
    tour
}

/// Sum of the distances between consecutive distinct cities of `tour`,
/// saturating at `Distance::MAX`.
pub fn tour_distance(tour: &[City], distances: &dyn DistanceProvider) -> Result<Distance> {
    let mut total = 0;
    for pair in tour.windows(2) {
        if pair[0] != pair[1] {
            total = distances.distance(&pair[0], &pair[1])?.saturating_add(total);
        }
    }
    Ok(total)
}

/// At most `capacity` solutions, ascending by distance, unique by
/// `visit_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionSet {
    capacity: usize,
    solutions: Vec<TourSolution>,
}

impl SolutionSet {
    pub fn new(capacity: usize) -> Self {
        SolutionSet {
            capacity,
            solutions: Vec::new(),
        }
    }

    /// Rank arbitrary solutions: stable sort by distance, drop repeated
    /// tours, keep the best `capacity`.
    pub fn from_solutions(capacity: usize, mut solutions: Vec<TourSolution>) -> Self {
        solutions.sort_by_key(|s| s.total_distance);
        let mut seen = HashSet::new();
        solutions.retain(|s| seen.insert(s.visit_order.clone()));
        solutions.truncate(capacity);
        SolutionSet { capacity, solutions }
    }

    /// Insert a solution, keeping the set ranked, unique and bounded.
    ///
    /// Returns whether the solution was kept. A solution equal in distance
    /// to the current worst of a full set is not kept.
    pub fn insert(&mut self, solution: TourSolution) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if let Some(pos) = self
            .solutions
            .iter()
            .position(|s| s.visit_order == solution.visit_order)
        {
            if self.solutions[pos].total_distance <= solution.total_distance {
                return false;
            }
            self.solutions.remove(pos);
        }
        if self.is_full() {
            match self.worst() {
                Some(worst) if solution.total_distance < worst.total_distance => {
                    self.solutions.pop();
                }
                _ => return false,
            }
        }
        let pos = self
            .solutions
            .partition_point(|s| s.total_distance <= solution.total_distance);
        self.solutions.insert(pos, solution);
        true
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.solutions.len() >= self.capacity
    }

    pub fn best(&self) -> Option<&TourSolution> {
        self.solutions.first()
    }

    pub fn worst(&self) -> Option<&TourSolution> {
        self.solutions.last()
    }

    pub fn get(&self, rank: usize) -> Option<&TourSolution> {
        self.solutions.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TourSolution> {
        self.solutions.iter()
    }

    pub fn as_slice(&self) -> &[TourSolution] {
        &self.solutions
    }

    pub fn into_vec(self) -> Vec<TourSolution> {
        self.solutions
    }
}

impl IntoIterator for SolutionSet {
    type Item = TourSolution;
    type IntoIter = std::vec::IntoIter<TourSolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.into_iter()
    }
}

impl<'a> IntoIterator for &'a SolutionSet {
    type Item = &'a TourSolution;
    type IntoIter = std::slice::Iter<'a, TourSolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::DistanceMatrix;

    fn line_matrix() -> DistanceMatrix {
        // D=0, A=1, B=2, C=3 on a line
        let pos = [0i64, 1, 2, 3];
        let rows = pos
            .iter()
            .map(|a| pos.iter().map(|b| (a - b).unsigned_abs()).collect())
            .collect();
        DistanceMatrix::from_rows(
            vec!["D".into(), "A".into(), "B".into(), "C".into()],
            rows,
        )
        .unwrap()
    }

    fn tour(cities: &[&str], distance: Distance) -> TourSolution {
        TourSolution {
            scenario_id: 0,
            visit_order: cities.iter().map(|&c| City::from(c)).collect(),
            total_distance: distance,
            algorithm: "test".to_string(),
            computation_time: 0.0,
        }
    }

    #[test]
    fn test_close_tour_collapses() {
        let depot = City::from("D");
        let stops = ["D", "A", "A", "B", "D"].map(City::from);
        let names: Vec<String> = close_tour(&depot, stops).iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["D", "A", "B", "D"]);

        let empty = close_tour(&depot, Vec::new());
        assert_eq!(empty, vec![depot.clone(), depot]);
    }

    #[test]
    fn test_from_stops_distance() {
        let matrix = line_matrix();
        let depot = City::from("D");
        let solution = TourSolution::from_stops(
            3,
            &depot,
            ["C", "A", "B"].map(City::from),
            &matrix,
            "test",
        )
        .unwrap();

        assert_eq!(solution.total_distance, 3 + 2 + 1 + 2);
        assert_eq!(solution.dedup_key().len(), 3);
        assert!(solution.is_consistent(&depot, &matrix).unwrap());
    }

    #[test]
    fn test_tour_distance_saturates() {
        let far = Distance::MAX - 1;
        let distances = DistanceMatrix::from_rows(
            vec!["D".into(), "A".into()],
            vec![vec![0, far], vec![far, 0]],
        )
        .unwrap();
        let tour: Vec<City> = vec!["D".into(), "A".into(), "D".into()];
        assert_eq!(tour_distance(&tour, &distances).unwrap(), Distance::MAX);
    }

    #[test]
    fn test_solution_set_ranking() {
        let mut set = SolutionSet::new(2);
        assert!(set.insert(tour(&["D", "A", "B", "D"], 10)));
        assert!(set.insert(tour(&["D", "B", "A", "D"], 8)));
        assert!(!set.insert(tour(&["D", "A", "B", "D"], 10)));
        assert!(!set.insert(tour(&["D", "C", "A", "D"], 10)));
        assert!(set.insert(tour(&["D", "C", "B", "D"], 4)));

        let distances: Vec<Distance> = set.iter().map(|s| s.total_distance).collect();
        assert_eq!(distances, vec![4, 8]);
        assert!(set.is_full());
    }

    #[test]
    fn test_solution_set_zero_capacity() {
        let mut set = SolutionSet::new(0);
        assert!(!set.insert(tour(&["D", "A", "D"], 1)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_from_solutions_dedup() {
        let set = SolutionSet::from_solutions(
            5,
            vec![
                tour(&["D", "A", "D"], 3),
                tour(&["D", "B", "D"], 1),
                tour(&["D", "A", "D"], 3),
            ],
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.best().unwrap().total_distance, 1);
    }
}
