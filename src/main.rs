//! Sales Tour Solver - Command Line Interface
//!
//! Plans pickup-before-delivery tours for card trading scenarios.

use clap::{Parser, Subcommand, ValueEnum};
use sales_tour_solver::benchmark::{Benchmark, BenchmarkConfig};
use sales_tour_solver::dataset::Dataset;
use sales_tour_solver::exact::{KBestSearch, SearchConfig};
use sales_tour_solver::generator::{DatasetGenerator, GeneratorConfig};
use sales_tour_solver::graph::{ConstraintGraph, EdgeKind};
use sales_tour_solver::heuristics::{kahn_order, GreedySolver, TopologicalSolver, TourSolver};
use sales_tour_solver::instance::{Scenario, ScenarioId};
use sales_tour_solver::solution::{SolutionSet, TourSolution};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sales-tour")]
#[command(version = "1.0")]
#[command(about = "Plans card pickup and delivery tours from a depot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one scenario
    Solve {
        /// Dataset JSON file, or a directory of text resources
        #[arg(short, long)]
        dataset: PathBuf,

        /// Scenario identifier
        #[arg(short, long, default_value = "0")]
        scenario: ScenarioId,

        /// Algorithm to use
        #[arg(short, long, value_enum, default_value = "k-best")]
        algorithm: Algorithm,

        /// Number of ranked tours (k-best only)
        #[arg(short, long, default_value = "3")]
        k: usize,

        #[command(flatten)]
        budget: BudgetArgs,

        /// Depot city when reading a resource directory
        #[arg(long, default_value = "Velizy")]
        depot: String,

        /// Output tours to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run every algorithm on every scenario of a dataset
    Benchmark {
        #[arg(short, long)]
        dataset: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of ranked tours requested from the k-best search
        #[arg(short, long, default_value = "5")]
        k: usize,

        #[command(flatten)]
        budget: BudgetArgs,

        #[arg(long, default_value = "Velizy")]
        depot: String,

        /// Run scenarios one after the other
        #[arg(long)]
        sequential: bool,
    },

    /// Analyze a dataset or one of its scenarios
    Analyze {
        #[arg(short, long)]
        dataset: PathBuf,

        /// Scenario to inspect; all scenarios when omitted
        #[arg(short, long)]
        scenario: Option<ScenarioId>,

        #[arg(long, default_value = "Velizy")]
        depot: String,
    },

    /// Generate a random dataset
    Generate {
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "12")]
        cities: usize,

        #[arg(long, default_value = "20")]
        members: usize,

        #[arg(long, default_value = "8")]
        scenarios: usize,

        #[arg(long, default_value = "2")]
        min_sales: usize,

        #[arg(long, default_value = "6")]
        max_sales: usize,
    },
}

/// Search budget overrides. Unset values come from the dataset, then from
/// the defaults.
#[derive(clap::Args)]
struct BudgetArgs {
    /// Time limit in seconds
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Maximum number of explored branches
    #[arg(long)]
    max_branches: Option<u64>,

    /// Refuse scenarios with more stops than this
    #[arg(long)]
    max_stops: Option<usize>,
}

impl BudgetArgs {
    fn apply(&self, mut config: SearchConfig) -> SearchConfig {
        if let Some(t) = self.time_limit {
            config.time_limit = t;
        }
        if let Some(b) = self.max_branches {
            config.max_branches = b;
        }
        if self.max_stops.is_some() {
            config.max_stops = self.max_stops;
        }
        config
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Algorithm {
    /// Kahn topological order
    Topological,
    /// Nearest-obligation greedy
    Greedy,
    /// K-best branch and bound
    KBest,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            dataset,
            scenario,
            algorithm,
            k,
            budget,
            depot,
            output,
            verbose,
        } => {
            solve_scenario(&dataset, &depot, scenario, algorithm, k, &budget, output, verbose);
        }

        Commands::Benchmark {
            dataset,
            output,
            k,
            budget,
            depot,
            sequential,
        } => {
            run_benchmark(&dataset, &depot, &output, k, &budget, !sequential);
        }

        Commands::Analyze {
            dataset,
            scenario,
            depot,
        } => {
            analyze_dataset(&dataset, &depot, scenario);
        }

        Commands::Generate {
            output,
            seed,
            cities,
            members,
            scenarios,
            min_sales,
            max_sales,
        } => {
            let config = GeneratorConfig {
                seed,
                num_cities: cities,
                num_members: members,
                num_scenarios: scenarios,
                min_sales,
                max_sales,
                ..Default::default()
            };
            generate_dataset(&output, config);
        }
    }
}

/// Print the error and exit with status 1.
fn exit_on_error<T, E: std::fmt::Display>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("{}: {}", context, e);
            std::process::exit(1);
        }
    }
}

fn load_dataset(path: &Path, depot: &str) -> Dataset {
    println!("Loading dataset from {:?}...", path);
    let dataset = if path.is_dir() {
        Dataset::from_resource_dir(path, depot)
    } else {
        Dataset::from_file(path)
    };
    exit_on_error(dataset, "Error loading dataset")
}

#[allow(clippy::too_many_arguments)]
fn solve_scenario(
    path: &Path,
    depot: &str,
    id: ScenarioId,
    algorithm: Algorithm,
    k: usize,
    budget: &BudgetArgs,
    output: Option<PathBuf>,
    verbose: bool,
) {
    let dataset = load_dataset(path, depot);
    let scenario = exit_on_error(dataset.scenario(id), "Error loading scenario");

    print_constraints(&scenario);
    if verbose {
        println!("{}\n", dataset.statistics());
    }

    println!("Solving with {:?} algorithm...", algorithm);
    let tours: SolutionSet = match algorithm {
        Algorithm::Topological => {
            let tour = exit_on_error(
                TopologicalSolver::new().solve(&scenario, &dataset.distances),
                "Solver error",
            );
            SolutionSet::from_solutions(1, vec![tour])
        }
        Algorithm::Greedy => {
            let tour = exit_on_error(
                GreedySolver::new().solve(&scenario, &dataset.distances),
                "Solver error",
            );
            SolutionSet::from_solutions(1, vec![tour])
        }
        Algorithm::KBest => {
            let config = budget.apply(dataset.search_config());
            let search = KBestSearch::new(config);
            let result =
                exit_on_error(search.search(&scenario, &dataset.distances, k), "Solver error");

            println!("\n========== Search ==========");
            println!("Status: {}", result.status);
            println!("Branches explored: {}", result.stats.branches_explored);
            println!("Branches pruned: {}", result.stats.branches_pruned);
            println!("Complete tours: {}", result.stats.tours_completed);
            println!("Duplicates discarded: {}", result.stats.duplicates_discarded);
            println!("Time: {:.4}s", result.stats.elapsed);
            result.solutions
        }
    };

    println!("\n========== Results ==========");
    if tours.is_empty() {
        println!("No valid tour exists for scenario {}.", id);
    }
    for (rank, tour) in tours.iter().enumerate() {
        print_tour(rank + 1, tour, verbose);
    }
    if algorithm == Algorithm::KBest && tours.len() < k {
        println!("Only {} distinct tour(s) found, {} requested.", tours.len(), k);
    }

    if let Some(out_path) = output {
        let json = exit_on_error(
            serde_json::to_string_pretty(tours.as_slice()),
            "Error serializing tours",
        );
        exit_on_error(std::fs::write(&out_path, json), "Error writing output");
        println!("\nTours saved to {:?}", out_path);
    }
}

fn print_constraints(scenario: &Scenario) {
    println!("Constraints of scenario {}:", scenario.id);
    println!("   (each sale: seller+ must be visited before buyer-)");
    for (i, sale) in scenario.sales.iter().enumerate() {
        let note = if sale.is_well_formed() { "" } else { "  [ignored]" };
        println!("   {:2}. {}{}", i + 1, sale, note);
    }
    println!();
}

fn print_tour(rank: usize, tour: &TourSolution, verbose: bool) {
    println!("{}", "-".repeat(80));
    println!(" TOUR #{:<2} {:>60} km", rank, tour.total_distance);
    println!("{}", "-".repeat(80));
    let names: Vec<&str> = tour.visit_order.iter().map(|c| c.name()).collect();
    println!("  {}", names.join(" -> "));
    if verbose {
        println!("  Stops: {}", tour.dedup_key().len());
        println!("  Algorithm: {} ({:.4}s)", tour.algorithm, tour.computation_time);
    }
}

fn run_benchmark(
    path: &Path,
    depot: &str,
    output: &Path,
    k: usize,
    budget: &BudgetArgs,
    parallel: bool,
) {
    let dataset = load_dataset(path, depot);
    let scenarios = exit_on_error(dataset.scenarios(), "Error loading scenarios");
    println!("Found {} scenarios", scenarios.len());

    if scenarios.is_empty() {
        eprintln!("No scenarios found!");
        return;
    }

    exit_on_error(std::fs::create_dir_all(output), "Failed to create output directory");

    let config = BenchmarkConfig {
        k,
        search: budget.apply(dataset.search_config()),
        parallel,
        show_progress: true,
    };
    let mut benchmark = Benchmark::new(config);
    benchmark.run(&scenarios, &dataset.distances);

    let results_path = output.join("results.csv");
    exit_on_error(benchmark.export_to_csv(&results_path), "Failed to export results");
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    exit_on_error(benchmark.export_statistics_csv(&stats_path), "Failed to export statistics");
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    exit_on_error(std::fs::write(&report_path, &report), "Failed to save report");
    println!("Report saved to {:?}", report_path);
}

fn analyze_dataset(path: &Path, depot: &str, id: Option<ScenarioId>) {
    let dataset = load_dataset(path, depot);

    println!("========== Dataset Analysis ==========\n");
    println!("{}", dataset.statistics());

    let ids = match id {
        Some(id) => vec![id],
        None => dataset.book.scenario_ids(),
    };

    for id in ids {
        let scenario = exit_on_error(dataset.scenario(id), "Error loading scenario");
        let graph = ConstraintGraph::from_sales(scenario.well_formed_sales());

        println!("\n---------- Scenario {} ----------", id);
        print_constraints(&scenario);

        let same_city = graph
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::SameCity)
            .count();
        let fused: Vec<&str> = graph
            .stops()
            .iter()
            .filter(|s| s.is_fused())
            .map(|s| s.city.name())
            .collect();
        println!("Graph:");
        println!("  Vertices: {}", graph.vertices().len());
        println!("  Edges: {} ({} same-city)", graph.edges().len(), same_city);
        println!("  Stops: {}", graph.stops().len());
        if !fused.is_empty() {
            println!("  Cities serving both roles: {}", fused.join(", "));
        }

        let order = kahn_order(&graph);
        if order.len() < graph.stops().len() {
            println!("  Precedence cycle: no feasible tour");
        } else {
            let names: Vec<&str> = order.iter().map(|&s| graph.stops()[s].city.name()).collect();
            println!("  Topological order: {}", names.join(" -> "));
        }
    }
}

fn generate_dataset(output: &Path, config: GeneratorConfig) {
    let name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("generated")
        .to_string();
    let dataset = exit_on_error(
        DatasetGenerator::new(config).generate(&name),
        "Error generating dataset",
    );
    exit_on_error(dataset.to_file(output), "Error writing dataset");
    println!("{}", dataset.statistics());
    println!("\nDataset saved to {:?}", output);
}
