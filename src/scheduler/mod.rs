//! Parallel extraction with fail-fast error reporting.
//!
//! Jobs go to a fixed rayon pool. The first failure is kept in a
//! [`FirstError`] slot; once it is filled no further job is submitted and
//! queued jobs are dropped when a worker picks them up, but jobs that are
//! already running are left to finish. `run` returns after every worker is idle.

mod first_error;

pub use first_error::FirstError;

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extract::{ExtractionFailure, Extractor};
use crate::plan::ExtractionJob;

/// A failed job, named by sheet and track.
#[derive(Debug, Error)]
#[error("{}: track {track}: {source}", .sheet.display())]
pub struct ExtractionError {
    pub sheet: PathBuf,
    pub track: u32,
    pub destination: PathBuf,
    pub source: ExtractionFailure,
    /// What the whole run got through before it stopped
    pub summary: RunSummary,
}

/// Lifecycle of one job. `Pending` is also where a job stays when the run stops before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Dispatched,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Never started because an earlier job failed
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.skipped += 1,
            JobState::Dispatched => self.dispatched += 1,
            JobState::Succeeded => self.succeeded += 1,
            JobState::Failed => self.failed += 1,
        }
    }
}

pub struct Scheduler {
    pool: ThreadPool,
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("extract-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every job, or stop at the first failure once in-flight jobs have drained.
    pub fn run<E>(&self, jobs: Vec<ExtractionJob>, extractor: &E) -> Result<RunSummary, ExtractionError>
    where
        E: Extractor + ?Sized,
    {
        let total = jobs.len();
        info!("Extracting {} tracks with {} workers", total, self.workers());

        let first_error = FirstError::new();
        let summary = Mutex::new(RunSummary::default());
        let record = |state: JobState| {
            summary
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(state)
        };

        self.pool.scope(|scope| {
            let first_error = &first_error;
            let record = &record;
            for job in jobs {
                // Stop accepting submissions
                if first_error.is_set() {
                    record(JobState::Pending);
                    continue;
                }
                scope.spawn(move |_| {
                    if first_error.is_set() {
                        debug!("Dropping track {} of {}", job.track.number, job.sheet().display());
                        record(JobState::Pending);
                        return;
                    }
                    record(JobState::Dispatched);
                    record(execute(&job, extractor, first_error));
                });
            }
        });

        let summary = summary.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut error) = first_error.into_inner() {
            warn!(
                "Extracted {} of {} tracks, {} failed, {} not started",
                summary.succeeded, total, summary.failed, summary.skipped
            );
            error.summary = summary;
            return Err(error);
        }
        info!("Extracted {} of {} tracks", summary.succeeded, total);
        Ok(summary)
    }
}

fn execute<E>(job: &ExtractionJob, extractor: &E, first_error: &FirstError<ExtractionError>) -> JobState
where
    E: Extractor + ?Sized,
{
    debug!(
        "Track {} of {}: {} .. {} -> {}",
        job.track.number,
        job.sheet().display(),
        job.boundary.start,
        job.boundary.end,
        job.destination.display()
    );

    match extractor.extract(job) {
        Ok(()) => {
            info!("✓ Track {} -> {}", job.track.number, job.destination.display());
            JobState::Succeeded
        }
        Err(source) => {
            let error = ExtractionError {
                sheet: job.sheet().to_path_buf(),
                track: job.track.number,
                destination: job.destination.clone(),
                source,
                summary: RunSummary::default(),
            };
            if let Err(error) = first_error.record(error) {
                warn!("Also failed: {}", error);
            }
            JobState::Failed
        }
    }
}
