//! K-best tour enumeration with branch-and-bound.
//!
//! Depth-first search over the orders of the scenario's stops. A stop can
//! be placed once every stop holding the pickup of a card it receives is
//! already placed. Completed tours go through a precedence check, a
//! deduplication step and a bounded max-heap holding the K best tours seen
//! so far; the worst of those K is the bound used to abandon partial
//! tours.
//!
//! The search is best-effort: it stops when the wall-clock or the branch
//! budget runs out and returns what it retained so far, ranked.

use crate::error::{Result, SolverError};
use crate::graph::ConstraintGraph;
use crate::heuristics::{kahn_order, TourSolver};
use crate::instance::{City, Distance, DistanceProvider, SaleProvider, Scenario, ScenarioId};
use crate::solution::{SolutionSet, TourSolution};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

/// Node index of the depot in the distance table.
const DEPOT: usize = 0;

/// How often (in branches) the wall clock is read.
const CLOCK_CHECK_INTERVAL: u64 = 256;

/// Search budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Wall-clock budget in seconds
    pub time_limit: f64,
    /// Maximum number of branches (stop placements) explored
    pub max_branches: u64,
    /// Reject scenarios with more stops than this instead of searching
    pub max_stops: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            time_limit: 10.0,
            max_branches: 500_000,
            max_stops: None,
        }
    }
}

/// Why the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// The whole search space was explored or pruned.
    Complete,
    /// The precedence graph has a cycle; no tour exists.
    Infeasible,
    TimeLimitReached,
    BranchLimitReached,
}

impl SearchStatus {
    pub fn is_truncated(&self) -> bool {
        matches!(self, SearchStatus::TimeLimitReached | SearchStatus::BranchLimitReached)
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SearchStatus::Complete => "complete",
            SearchStatus::Infeasible => "infeasible",
            SearchStatus::TimeLimitReached => "time limit reached",
            SearchStatus::BranchLimitReached => "branch limit reached",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub branches_explored: u64,
    pub branches_pruned: u64,
    /// Complete tours reaching the retention step
    pub tours_completed: u64,
    pub duplicates_discarded: u64,
    /// Best distance over every completed tour. Informational only: pruning
    /// compares against the K-th worst retained distance once K tours are held.
    pub best_seen: Option<Distance>,
    pub elapsed: f64,
}

#[derive(Debug, Clone)]
pub struct KBestResult {
    pub solutions: SolutionSet,
    pub status: SearchStatus,
    pub stats: SearchStats,
}

/// K-best search engine.
#[derive(Debug, Clone, Default)]
pub struct KBestSearch {
    pub config: SearchConfig,
}

impl KBestSearch {
    pub fn new(config: SearchConfig) -> Self {
        KBestSearch { config }
    }

    /// Up to `k` distinct tours of `scenario`, ascending by distance.
    ///
    /// `k == 0`, a cyclic scenario and an exhausted budget are not errors.
    /// Fails on unknown cities and on scenarios above `max_stops`.
    pub fn search(
        &self,
        scenario: &Scenario,
        distances: &dyn DistanceProvider,
        k: usize,
    ) -> Result<KBestResult> {
        let start = Instant::now();
        if k == 0 {
            return Ok(KBestResult {
                solutions: SolutionSet::new(0),
                status: SearchStatus::Complete,
                stats: SearchStats::default(),
            });
        }

        let graph = ConstraintGraph::from_sales(scenario.well_formed_sales());
        let stop_count = graph.stops().len();
        if let Some(max) = self.config.max_stops {
            if stop_count > max {
                return Err(SolverError::ScenarioTooLarge {
                    scenario: scenario.id,
                    stops: stop_count,
                    max,
                });
            }
        }

        if kahn_order(&graph).len() < stop_count {
            log::debug!("scenario {}: precedence cycle, nothing to enumerate", scenario.id);
            return Ok(KBestResult {
                solutions: SolutionSet::new(k),
                status: SearchStatus::Infeasible,
                stats: SearchStats {
                    elapsed: start.elapsed().as_secs_f64(),
                    ..SearchStats::default()
                },
            });
        }

        let table = CostTable::build(&scenario.depot, &graph, distances)?;
        log::debug!(
            "scenario {}: k-best search over {} stops (k={}, {:.1}s, {} branches)",
            scenario.id,
            stop_count,
            k,
            self.config.time_limit,
            self.config.max_branches
        );

        let mut session = SearchSession::new(&graph, &table, k, &self.config, start);
        session.explore(DEPOT, 0);
        let (ranked, status, mut stats) = session.finish();

        let elapsed = start.elapsed().as_secs_f64();
        stats.elapsed = elapsed;
        let mut solutions = SolutionSet::new(k);
        for entry in ranked {
            let cities = entry.stops.iter().map(|&s| graph.stops()[s].city.clone());
            let mut solution = TourSolution::from_stops(
                scenario.id,
                &scenario.depot,
                cities,
                distances,
                self.name(),
            )?;
            debug_assert_eq!(solution.total_distance, entry.distance);
            solution.computation_time = elapsed;
            solutions.insert(solution);
        }

        if status.is_truncated() {
            log::info!(
                "scenario {}: search stopped ({}) after {} branches, {} tours kept",
                scenario.id,
                status,
                stats.branches_explored,
                solutions.len()
            );
        }

        Ok(KBestResult {
            solutions,
            status,
            stats,
        })
    }

    /// Best tour of `scenario`; fails with `NoSolutionFound` if there is
    /// none.
    pub fn best(
        &self,
        scenario: &Scenario,
        distances: &dyn DistanceProvider,
    ) -> Result<TourSolution> {
        self.search(scenario, distances, 1)?
            .solutions
            .into_iter()
            .next()
            .ok_or(SolverError::NoSolutionFound(scenario.id))
    }
}

impl TourSolver for KBestSearch {
    fn solve(&self, scenario: &Scenario, distances: &dyn DistanceProvider) -> Result<TourSolution> {
        self.best(scenario, distances)
    }

    fn name(&self) -> &str {
        "KBest"
    }
}

/// Look up scenario `id` and return its best tour.
pub fn summarize_scenario(
    sales: &dyn SaleProvider,
    distances: &dyn DistanceProvider,
    id: ScenarioId,
    depot: &City,
    config: &SearchConfig,
) -> Result<TourSolution> {
    let scenario = Scenario::load(sales, id, depot.clone())?;
    KBestSearch::new(config.clone()).best(&scenario, distances)
}

/// Distances between the depot (node 0) and the stops (node `s + 1`),
/// fetched once per search. Nodes sharing a city are 0 apart.
struct CostTable {
    size: usize,
    data: Vec<Distance>,
    /// Canonical node of each node's city: the depot stop maps to `DEPOT`.
    city_node: Vec<usize>,
}

impl CostTable {
    fn build(
        depot: &City,
        graph: &ConstraintGraph,
        distances: &dyn DistanceProvider,
    ) -> Result<Self> {
        let cities: Vec<&City> = std::iter::once(depot)
            .chain(graph.stops().iter().map(|s| &s.city))
            .collect();
        let size = cities.len();
        let mut data = vec![0; size * size];
        for (i, from) in cities.iter().enumerate() {
            for (j, to) in cities.iter().enumerate() {
                if from != to {
                    data[i * size + j] = distances.distance(from, to)?;
                }
            }
        }
        let city_node = cities
            .iter()
            .enumerate()
            .map(|(i, c)| if *c == depot { DEPOT } else { i })
            .collect();
        Ok(CostTable {
            size,
            data,
            city_node,
        })
    }

    #[inline]
    fn get(&self, from: usize, to: usize) -> Distance {
        self.data[from * self.size + to]
    }
}

/// A retained tour. Ordered by distance, then discovery order, so the heap
/// top is the worst tour and, among equals, the latest found.
#[derive(Debug)]
struct Ranked {
    distance: Distance,
    seq: u64,
    stops: Vec<usize>,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}

struct SearchSession<'a> {
    graph: &'a ConstraintGraph,
    table: &'a CostTable,
    config: &'a SearchConfig,
    start: Instant,
    k: usize,
    /// Stops by descending out-degree
    priority: Vec<usize>,
    /// Unplaced predecessors of each stop
    missing: Vec<usize>,
    placed: Vec<bool>,
    path: Vec<usize>,
    /// Cheapest way to enter each stop from any other node
    min_entry: Vec<Distance>,
    /// Admissible cost of completing the current partial tour
    remaining_bound: Distance,
    retained: BinaryHeap<Ranked>,
    seen: HashMap<Vec<usize>, Distance>,
    next_seq: u64,
    stats: SearchStats,
    stopped: Option<SearchStatus>,
}

impl<'a> SearchSession<'a> {
    fn new(
        graph: &'a ConstraintGraph,
        table: &'a CostTable,
        k: usize,
        config: &'a SearchConfig,
        start: Instant,
    ) -> Self {
        let n = graph.stops().len();

        let mut priority: Vec<usize> = (0..n).collect();
        priority.sort_by_key(|&s| std::cmp::Reverse(graph.out_degree(s)));

        let min_entry: Vec<Distance> = (0..n)
            .map(|s| {
                (0..=n)
                    .filter(|&from| from != s + 1)
                    .map(|from| table.get(from, s + 1))
                    .min()
                    .unwrap_or(0)
            })
            .collect();
        let min_return = (1..=n).map(|from| table.get(from, DEPOT)).min().unwrap_or(0);
        let remaining_bound = min_entry
            .iter()
            .fold(min_return, |acc, &d| acc.saturating_add(d));

        SearchSession {
            graph,
            table,
            config,
            start,
            k,
            priority,
            missing: (0..n).map(|s| graph.in_degree(s)).collect(),
            placed: vec![false; n],
            path: Vec::with_capacity(n),
            min_entry,
            remaining_bound,
            retained: BinaryHeap::new(),
            seen: HashMap::new(),
            next_seq: 0,
            stats: SearchStats::default(),
            stopped: None,
        }
    }

    /// Distance a partial tour must stay under to be worth extending, once
    /// K tours are held.
    fn bound(&self) -> Option<Distance> {
        if self.retained.len() >= self.k {
            self.retained.peek().map(|worst| worst.distance)
        } else {
            None
        }
    }

    /// Count one branch against the budgets. Returns false once a budget
    /// is exhausted.
    fn charge_branch(&mut self) -> bool {
        self.stats.branches_explored += 1;
        if self.stats.branches_explored > self.config.max_branches {
            self.stats.branches_explored -= 1;
            self.stopped = Some(SearchStatus::BranchLimitReached);
            return false;
        }
        if self.stats.branches_explored % CLOCK_CHECK_INTERVAL == 0
            && self.start.elapsed().as_secs_f64() >= self.config.time_limit
        {
            self.stopped = Some(SearchStatus::TimeLimitReached);
            return false;
        }
        true
    }

    fn explore(&mut self, last: usize, partial: Distance) {
        if self.path.len() == self.placed.len() {
            let total = partial.saturating_add(self.table.get(last, DEPOT));
            self.complete(total);
            return;
        }

        for i in 0..self.priority.len() {
            let stop = self.priority[i];
            if self.placed[stop] || self.missing[stop] > 0 {
                continue;
            }
            if !self.charge_branch() {
                return;
            }

            let node = stop + 1;
            let next_partial = partial.saturating_add(self.table.get(last, node));
            let next_remaining = self.remaining_bound.saturating_sub(self.min_entry[stop]);
            if self
                .bound()
                .is_some_and(|worst| next_partial.saturating_add(next_remaining) >= worst)
            {
                self.stats.branches_pruned += 1;
                continue;
            }

            let saved_bound = self.remaining_bound;
            self.place(stop);
            self.remaining_bound = next_remaining;
            self.explore(node, next_partial);
            self.remaining_bound = saved_bound;
            self.unplace(stop);

            if self.stopped.is_some() {
                return;
            }
        }
    }

    fn place(&mut self, stop: usize) {
        self.placed[stop] = true;
        self.path.push(stop);
        for &next in self.graph.successors(stop) {
            self.missing[next] -= 1;
        }
    }

    fn unplace(&mut self, stop: usize) {
        for &next in self.graph.successors(stop) {
            self.missing[next] += 1;
        }
        self.path.pop();
        self.placed[stop] = false;
    }

    /// Tour without the depot passages, as canonical city nodes.
    fn dedup_key(&self) -> Vec<usize> {
        let mut key: Vec<usize> = Vec::with_capacity(self.path.len());
        let mut previous = DEPOT;
        for &stop in &self.path {
            let node = self.table.city_node[stop + 1];
            if node != previous {
                key.push(node);
                previous = node;
            }
        }
        if key.last() == Some(&DEPOT) {
            key.pop();
        }
        key
    }

    fn complete(&mut self, total: Distance) {
        self.stats.tours_completed += 1;

        let order = self.graph.vertex_order(&self.path);
        if !self.graph.respects_precedence(&order) {
            log::error!("discarding tour violating precedence: {:?}", self.path);
            return;
        }

        self.stats.best_seen = Some(self.stats.best_seen.map_or(total, |b| b.min(total)));

        let key = self.dedup_key();
        if let Some(&known) = self.seen.get(&key) {
            if known <= total {
                self.stats.duplicates_discarded += 1;
                return;
            }
        }
        self.seen.insert(key, total);

        let entry = Ranked {
            distance: total,
            seq: self.next_seq,
            stops: self.path.clone(),
        };
        self.next_seq += 1;

        if self.retained.len() < self.k {
            self.retained.push(entry);
        } else if self
            .retained
            .peek()
            .is_some_and(|worst| total < worst.distance)
        {
            self.retained.pop();
            self.retained.push(entry);
        }
    }

    fn finish(self) -> (Vec<Ranked>, SearchStatus, SearchStats) {
        let status = self.stopped.unwrap_or(SearchStatus::Complete);
        (self.retained.into_sorted_vec(), status, self.stats)
    }
}
