//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw inputs (`Observation`, `RegionSeries`, `CaseTable`)
//! - prepared fit inputs (`PreparedSeries`)
//! - fit outputs (`FitParameters`, `FittedRegion`, `SkipReason`, `BatchReport`)
//! - projection outputs (`ProjectionPoint`)
//! - run configuration (`PipelineConfig`, `PrepOptions`, `FitOptions`, `ParamBounds`)

pub mod types;

pub use types::*;
