//! Exact solvers module.

pub mod kbest;

pub use kbest::{
    summarize_scenario, KBestResult, KBestSearch, SearchConfig, SearchStats, SearchStatus,
};
