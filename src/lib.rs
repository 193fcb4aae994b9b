//! Sales Tour Solver Library
//!
//! Plans the road trip of a courier who collects traded cards from sellers
//! and hands them to buyers, starting and ending at a depot. A card must be
//! picked up before it is delivered.
//!
//! # Features
//!
//! - Constraint graph over pickup/delivery vertices, with one stop per city
//! - Topological solver (Kahn) returning a feasible tour
//! - Nearest-obligation greedy solver
//! - K-best branch-and-bound search with time and branch budgets
//! - Scenario datasets (JSON or plain-text resources) and a random generator
//! - Benchmarking tools
//!
//! # Example
//!
//! ```no_run
//! use sales_tour_solver::dataset::Dataset;
//! use sales_tour_solver::exact::KBestSearch;
//!
//! let dataset = Dataset::from_file("dataset.json").unwrap();
//! let scenario = dataset.scenario(0).unwrap();
//!
//! let search = KBestSearch::new(dataset.search_config());
//! let result = search.search(&scenario, &dataset.distances, 3).unwrap();
//! for tour in &result.solutions {
//!     println!("{}", tour);
//! }
//! ```

pub mod benchmark;
pub mod dataset;
pub mod error;
pub mod exact;
pub mod generator;
pub mod graph;
pub mod heuristics;
pub mod instance;
pub mod solution;

pub use error::{DatasetError, SolverError};
pub use instance::{City, DistanceMatrix, DistanceProvider, Sale, SaleProvider, Scenario};
pub use solution::{SolutionSet, TourSolution};
