//! Series preparation.
//!
//! Responsibilities:
//!
//! - reject structurally malformed series (`series`)
//! - trim leading zeros and record each region's epoch offset (`series`)
//! - drop series too short to fit (`series`)
//! - optional post-load table transforms composed by the caller (`transform`)

pub mod series;
pub mod transform;

pub use series::*;
pub use transform::*;
