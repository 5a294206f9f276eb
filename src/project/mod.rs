//! Projection of fitted curves onto calendar dates with confidence envelopes.

pub mod band;

pub use band::*;
