//! Harvest Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Harvest workspace.
//!
//! # Overview
//!
//! This crate provides the pieces every Harvest workspace member needs:
//!
//! - **Error Handling**: the [`HarvestError`] enum and [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//!
//! # Example
//!
//! ```no_run
//! use harvest_common::{HarvestError, Result};
//!
//! fn parse_schema(definition: &str) -> Result<serde_json::Value> {
//!     serde_json::from_str(definition).map_err(HarvestError::from)
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{HarvestError, Result};
