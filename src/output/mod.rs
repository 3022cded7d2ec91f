//! Output module for reporting batch results
//!
//! This module handles:
//! - Aggregating per-extension results into batch counts
//! - Listing the ids that need operator follow-up

pub mod stats;

pub use stats::{print_summary, BatchSummary};
