//! Random dataset generation for experiments and benchmarks.
//!
//! Cities are drawn on a square and separated by rounded Euclidean
//! distances. Generation is deterministic for a given seed.

use crate::dataset::{Dataset, ScenarioBook, Trade};
use crate::error::DatasetError;
use crate::instance::{City, Distance, DistanceMatrix, ScenarioId};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Cities besides the depot
    pub num_cities: usize,
    pub num_members: usize,
    pub num_scenarios: usize,
    pub min_sales: usize,
    pub max_sales: usize,
    /// Side of the square cities are placed on, in km
    pub area: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            seed: 42,
            num_cities: 12,
            num_members: 20,
            num_scenarios: 8,
            min_sales: 2,
            max_sales: 6,
            area: 800.0,
        }
    }
}

pub struct DatasetGenerator {
    config: GeneratorConfig,
}

impl DatasetGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        DatasetGenerator { config }
    }

    pub fn generate(&self, name: &str) -> Result<Dataset, DatasetError> {
        let cfg = &self.config;
        if cfg.num_cities < 2
            || cfg.num_members < 2
            || cfg.min_sales == 0
            || cfg.min_sales > cfg.max_sales
        {
            return Err(DatasetError::InvalidScenario {
                scenario: 0,
                reason: "generator needs at least two cities and members, \
                         and 0 < min_sales <= max_sales"
                    .to_string(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let depot = City::from("Depot");
        let mut cities = vec![depot.clone()];
        cities.extend((1..=cfg.num_cities).map(|i| City::new(format!("City{:02}", i))));

        let points: Vec<(f64, f64)> = cities
            .iter()
            .map(|_| (rng.gen_range(0.0..cfg.area), rng.gen_range(0.0..cfg.area)))
            .collect();
        let rows: Vec<Vec<Distance>> = points
            .iter()
            .map(|&(x1, y1)| {
                points
                    .iter()
                    .map(|&(x2, y2)| ((x1 - x2).hypot(y1 - y2)).round() as Distance)
                    .collect()
            })
            .collect();
        let distances = DistanceMatrix::from_rows(cities.clone(), rows)?;

        // Member cities exclude the depot
        let mut homes: Vec<usize> = (0..cfg.num_members)
            .map(|_| rng.gen_range(1..cities.len()))
            .collect();
        if homes.iter().all(|&h| h == homes[0]) {
            // At least two distinct cities are needed to draw a trade
            homes[1] = homes[0] % cfg.num_cities + 1;
        }
        let mut book = ScenarioBook::new();
        for (i, &home) in homes.iter().enumerate() {
            book.add_member(member_name(i), cities[home].clone());
        }

        for id in 0..cfg.num_scenarios {
            let count = rng.gen_range(cfg.min_sales..=cfg.max_sales);
            let mut trades = Vec::with_capacity(count);
            while trades.len() < count {
                let seller = rng.gen_range(0..cfg.num_members);
                let buyer = rng.gen_range(0..cfg.num_members);
                if homes[seller] == homes[buyer] {
                    continue;
                }
                trades.push(Trade::new(member_name(seller), member_name(buyer)));
            }
            book.add_scenario(id as ScenarioId, trades)?;
        }

        log::info!(
            "generated dataset {} ({} cities, {} members, {} scenarios, seed {})",
            name,
            cities.len(),
            cfg.num_members,
            cfg.num_scenarios,
            cfg.seed
        );

        Ok(Dataset {
            name: name.to_string(),
            depot,
            distances,
            book,
            search: None,
        })
    }
}

fn member_name(i: usize) -> String {
    format!("member{:02}", i + 1)
}
