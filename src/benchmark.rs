//! Benchmarking and comparison of the tour solvers.
//!
//! Runs the topological, greedy and K-best solvers on every scenario,
//! collects per-run results and aggregates them per algorithm.

use crate::exact::{KBestSearch, SearchConfig};
use crate::heuristics::{GreedySolver, TopologicalSolver, TourSolver};
use crate::instance::{Distance, DistanceProvider, Scenario, ScenarioId};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

/// Result of running a single algorithm on a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Algorithm name
    pub algorithm: String,
    pub scenario: ScenarioId,
    /// Number of sales in the scenario
    pub num_sales: usize,
    /// Tour distance, if a tour was produced
    pub distance: Option<Distance>,
    pub feasible: bool,
    /// Computation time in seconds
    pub time: f64,
    /// Gap to the best K-best tour, in percent
    pub gap_to_best: Option<f64>,
    /// Termination status (K-best only)
    pub status: Option<String>,
    /// Branches explored (K-best only)
    pub branches: Option<u64>,
    /// Number of ranked tours returned (K-best only)
    pub solutions: Option<usize>,
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: String,
    pub num_scenarios: usize,
    pub num_feasible: usize,
    pub avg_distance: f64,
    pub median_distance: f64,
    pub best_distance: f64,
    pub worst_distance: f64,
    pub std_distance: f64,
    pub avg_time: f64,
    pub total_time: f64,
    pub avg_gap: Option<f64>,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Ranked tours requested from the K-best search
    pub k: usize,
    pub search: SearchConfig,
    /// Run scenarios in parallel
    pub parallel: bool,
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            k: 5,
            search: SearchConfig::default(),
            parallel: true,
            show_progress: false,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<AlgorithmResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Run every solver on one scenario.
    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        distances: &dyn DistanceProvider,
    ) -> Vec<AlgorithmResult> {
        log::info!("Running benchmark on scenario {}", scenario.id);
        let num_sales = scenario.sales.len();
        let blank = |algorithm: &str| AlgorithmResult {
            algorithm: algorithm.to_string(),
            scenario: scenario.id,
            num_sales,
            distance: None,
            feasible: false,
            time: 0.0,
            gap_to_best: None,
            status: None,
            branches: None,
            solutions: None,
        };

        let search = KBestSearch::new(self.config.search.clone());
        let mut kbest = blank(search.name());
        let start = std::time::Instant::now();
        match search.search(scenario, distances, self.config.k) {
            Ok(result) => {
                kbest.distance = result.solutions.best().map(|s| s.total_distance);
                kbest.feasible = kbest.distance.is_some();
                kbest.status = Some(result.status.to_string());
                kbest.branches = Some(result.stats.branches_explored);
                kbest.solutions = Some(result.solutions.len());
            }
            Err(e) => log::warn!("{} failed on scenario {}: {}", search.name(), scenario.id, e),
        }
        kbest.time = start.elapsed().as_secs_f64();
        let best = kbest.distance;
        kbest.gap_to_best = best.map(|_| 0.0);

        let heuristics: Vec<Box<dyn TourSolver + Send + Sync>> =
            vec![Box::new(TopologicalSolver::new()), Box::new(GreedySolver::new())];

        let mut results = Vec::with_capacity(heuristics.len() + 1);
        for solver in heuristics {
            let mut result = blank(solver.name());
            match solver.solve(scenario, distances) {
                Ok(solution) => {
                    result.distance = Some(solution.total_distance);
                    result.feasible = true;
                    result.time = solution.computation_time;
                    result.gap_to_best = best.and_then(|b| gap(solution.total_distance, b));
                }
                Err(e) => log::warn!("{} failed on scenario {}: {}", solver.name(), scenario.id, e),
            }
            results.push(result);
        }
        results.push(kbest);
        results
    }

    /// Run the benchmark on a set of scenarios, appending to the results.
    pub fn run(&mut self, scenarios: &[Scenario], distances: &(dyn DistanceProvider + Sync)) {
        let bar = if self.config.show_progress {
            ProgressBar::new(scenarios.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} scenarios ({elapsed})")
        {
            bar.set_style(style);
        }

        let this = &*self;
        let run_one = |scenario: &Scenario| {
            let results = this.run_scenario(scenario, distances);
            bar.inc(1);
            results
        };
        let batches: Vec<Vec<AlgorithmResult>> = if self.config.parallel {
            scenarios.par_iter().map(run_one).collect()
        } else {
            scenarios.iter().map(run_one).collect()
        };
        bar.finish_and_clear();

        self.results.extend(batches.into_iter().flatten());
    }

    /// Compute statistics for each algorithm
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut stats_map: HashMap<&str, Vec<&AlgorithmResult>> = HashMap::new();
        for result in &self.results {
            stats_map.entry(result.algorithm.as_str()).or_default().push(result);
        }

        let mut statistics = Vec::new();
        for (algo, results) in stats_map {
            let feasible: Vec<&AlgorithmResult> =
                results.iter().copied().filter(|r| r.feasible).collect();
            let distances: Vec<f64> = feasible
                .iter()
                .filter_map(|r| r.distance)
                .map(|d| d as f64)
                .collect();
            if distances.is_empty() {
                continue;
            }
            let times: Vec<f64> = feasible.iter().map(|r| r.time).collect();
            let gaps: Vec<f64> = feasible.iter().filter_map(|r| r.gap_to_best).collect();

            statistics.push(AlgorithmStatistics {
                algorithm: algo.to_string(),
                num_scenarios: results.len(),
                num_feasible: feasible.len(),
                avg_distance: Statistics::mean(&distances),
                median_distance: Data::new(distances.clone()).median(),
                best_distance: Statistics::min(&distances),
                worst_distance: Statistics::max(&distances),
                std_distance: Statistics::population_std_dev(&distances),
                avg_time: Statistics::mean(&times),
                total_time: times.iter().sum(),
                avg_gap: if gaps.is_empty() {
                    None
                } else {
                    Some(Statistics::mean(&gaps))
                },
            });
        }

        statistics.sort_by(|a, b| a.avg_distance.total_cmp(&b.avg_distance));
        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for result in &self.results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       Sales Tour Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        report.push_str("Algorithm Performance Summary:\n");
        report.push_str("-".repeat(80).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<14} {:>10} {:>12} {:>12} {:>12} {:>10}\n",
            "Algorithm", "Feasible", "Avg Dist", "Median", "Avg Gap%", "Avg Time"
        ));
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        for stat in &self.compute_statistics() {
            let gap_str = stat
                .avg_gap
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "{:<14} {:>10} {:>12.2} {:>12.2} {:>12} {:>10.4}\n",
                stat.algorithm,
                format!("{}/{}", stat.num_feasible, stat.num_scenarios),
                stat.avg_distance,
                stat.median_distance,
                gap_str,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        report.push_str("\nBest Tour per Scenario:\n");
        let mut scenario_best: BTreeMap<ScenarioId, &AlgorithmResult> = BTreeMap::new();
        for result in &self.results {
            let Some(distance) = result.distance else {
                continue;
            };
            let entry = scenario_best.entry(result.scenario).or_insert(result);
            if entry.distance.map_or(true, |d| distance < d) {
                *entry = result;
            }
        }
        for (scenario, best) in &scenario_best {
            report.push_str(&format!(
                "  {}: {} km ({})\n",
                scenario,
                best.distance.unwrap_or_default(),
                best.algorithm
            ));
        }

        let truncated = self
            .results
            .iter()
            .filter(|r| r.status.as_deref().is_some_and(|s| s.ends_with("reached")))
            .count();
        if truncated > 0 {
            report.push_str(&format!("\n{} search(es) stopped on a budget.\n", truncated));
        }

        report
    }

    pub fn results(&self) -> &[AlgorithmResult] {
        &self.results
    }
}

/// Relative gap of `value` over `best`, in percent.
fn gap(value: Distance, best: Distance) -> Option<f64> {
    if best == 0 {
        (value == 0).then_some(0.0)
    } else {
        Some((value as f64 - best as f64) / best as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{City, DistanceMatrix, Sale};

    fn matrix() -> DistanceMatrix {
        let cities: Vec<City> = ["Depot", "A", "B", "C", "D"].map(City::from).to_vec();
        let rows = vec![
            vec![0, 12, 30, 18, 25],
            vec![12, 0, 20, 9, 28],
            vec![30, 20, 0, 15, 11],
            vec![18, 9, 15, 0, 14],
            vec![25, 28, 11, 14, 0],
        ];
        DistanceMatrix::from_rows(cities, rows).unwrap()
    }

    fn scenarios() -> Vec<Scenario> {
        vec![
            Scenario::new(0, "Depot", vec![Sale::new("A", "B"), Sale::new("C", "D")]),
            Scenario::new(1, "Depot", vec![Sale::new("A", "B"), Sale::new("B", "A")]),
        ]
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.k, 5);
        assert_eq!(config.search.max_branches, 500_000);
    }

    #[test]
    fn test_run_records_every_solver() {
        let mut bench = Benchmark::new(BenchmarkConfig::default());
        bench.run(&scenarios(), &matrix());
        assert_eq!(bench.results().len(), 6);

        let kbest = bench
            .results()
            .iter()
            .find(|r| r.scenario == 0 && r.algorithm == "KBest")
            .unwrap();
        assert_eq!(kbest.gap_to_best, Some(0.0));
        for r in bench.results().iter().filter(|r| r.scenario == 0) {
            assert!(r.gap_to_best.unwrap() >= 0.0);
        }

        // The cycle: no topological tour, empty K-best set, greedy still moves
        let topo = bench
            .results()
            .iter()
            .find(|r| r.scenario == 1 && r.algorithm == "Topological")
            .unwrap();
        assert!(!topo.feasible);
        let kbest = bench
            .results()
            .iter()
            .find(|r| r.scenario == 1 && r.algorithm == "KBest")
            .unwrap();
        assert_eq!(kbest.solutions, Some(0));
        assert_eq!(kbest.status.as_deref(), Some("infeasible"));
    }

    #[test]
    fn test_statistics_and_report() {
        let mut bench = Benchmark::new(BenchmarkConfig {
            parallel: false,
            ..BenchmarkConfig::default()
        });
        bench.run(&scenarios(), &matrix());

        let stats = bench.compute_statistics();
        assert_eq!(stats.len(), 3);
        let kbest = stats.iter().find(|s| s.algorithm == "KBest").unwrap();
        assert_eq!(kbest.num_scenarios, 2);
        assert_eq!(kbest.num_feasible, 1);
        assert_eq!(kbest.std_distance, 0.0);

        let report = bench.generate_report();
        assert!(report.contains("Best Tour per Scenario"));
        assert!(report.contains("KBest"));
    }

    #[test]
    fn test_gap() {
        assert_eq!(gap(110, 100), Some(10.0));
        assert_eq!(gap(0, 0), Some(0.0));
        assert_eq!(gap(5, 0), None);
    }
}
