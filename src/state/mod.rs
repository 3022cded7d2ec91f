//! State module for identifying and tracking extension updates
//!
//! # Components
//!
//! - `ExtensionId`: The validated 32-character key of one store listing
//! - `CrawlRun`: The second-precision UTC timestamp naming one update
//! - `UpdateState`: Where a single extension update is in its lifecycle

mod crawl_run;
mod extension_id;
mod update_state;

// Re-export main types
pub use crawl_run::CrawlRun;
pub use extension_id::{is_valid_id, ExtensionId, ID_LENGTH, SHARD_PREFIX_LENGTH};
pub use update_state::UpdateState;
