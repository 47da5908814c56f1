//! Output module for harvest reports
//!
//! This module handles collecting and printing harvest statistics.

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, HarvestStatistics};
