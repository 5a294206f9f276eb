//! Input/output helpers.
//!
//! - wide case-table CSV ingest (`ingest`)
//! - parameter table, projection, and report exports (`export`)
//! - case-level line-list ingest and summary exports (`linelist`)

pub mod export;
pub mod ingest;
pub mod linelist;

pub use export::*;
pub use ingest::*;
