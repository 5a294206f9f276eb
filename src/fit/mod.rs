//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - seed each region's solve from a small grid of start points
//! - fit each region independently (parallel across regions)
//! - classify results with the batch validity filter

pub mod batch;
pub mod fitter;
pub mod start_grid;

pub use batch::*;
pub use fitter::*;
pub use start_grid::*;
