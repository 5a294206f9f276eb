//! `epi-curves` library crate.
//!
//! The binary (`epi`) is a thin wrapper around this library so that:
//!
//! - preparation, fitting, and projection are testable without spawning processes
//! - a fitted parameter table can be reloaded and projected from other tools
//! - line-list summaries can be computed on in-memory case records

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod linelist;
pub mod math;
pub mod prep;
pub mod project;
pub mod report;
