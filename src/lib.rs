//! Split continuous disc images into per-track files, driven by CUE sheets.
//!
//! The pipeline is `sheet` (parse) → `boundary` (windows) → `naming`
//! (destination paths) → `plan` (jobs) → `scheduler` (parallel extraction
//! through an [`extract::Extractor`]).

pub mod boundary;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod naming;
pub mod plan;
pub mod scheduler;
pub mod sheet;

use std::path::PathBuf;

pub use config::SplitConfig;
pub use error::{Error, Result};

use extract::Extractor;
use scheduler::{RunSummary, Scheduler};

/// Plan every sheet, then extract all of their tracks.
///
/// Nothing is extracted unless the whole batch plans cleanly.
pub fn split<E>(sheets: &[PathBuf], config: &SplitConfig, extractor: &E) -> Result<RunSummary>
where
    E: Extractor + ?Sized,
{
    let plan = plan::prepare(sheets, config)?;
    let scheduler = Scheduler::new(config.concurrency)?;
    Ok(scheduler.run(plan.jobs, extractor)?)
}
