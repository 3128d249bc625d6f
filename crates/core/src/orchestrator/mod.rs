//! Sync orchestrator.
//!
//! Runs the whole pipeline for every configured series:
//! - **Groups**: one concurrent task per distinct source id
//! - **Series**: sequential inside a group (resolve → export → sync)
//! - **Failures**: logged per series; siblings and other groups carry on
//!
//! `Orchestrator::run` returns only after every group has finished.

mod runner;
mod types;

pub use runner::Orchestrator;
pub use types::{RunReport, SeriesError, SeriesReport};
