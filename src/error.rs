//! Crate-level error type.
//!
//! Module errors describe what went wrong; this wrapper adds the sheet the
//! failure belongs to so the user can find it.

use std::path::PathBuf;

use thiserror::Error;

use crate::boundary::ValidationError;
use crate::extract::ExtractionFailure;
use crate::naming::TemplateError;
use crate::scheduler::ExtractionError;
use crate::sheet::FormatError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Format { path: PathBuf, source: FormatError },

    #[error("{}: {source}", .path.display())]
    Validation {
        path: PathBuf,
        source: ValidationError,
    },

    /// The naming template does not compile
    #[error("naming template: {0}")]
    Template(#[source] TemplateError),

    /// A compiled template failed for one track
    #[error("{}: track {track}: {source}", .path.display())]
    Render {
        path: PathBuf,
        track: u32,
        source: TemplateError,
    },

    #[error("{}: track {second_track} would overwrite {} (track {first_track} of {})", .second.display(), .destination.display(), .first.display())]
    DuplicateDestination {
        destination: PathBuf,
        first: PathBuf,
        first_track: u32,
        second: PathBuf,
        second_track: u32,
    },

    #[error("{}: only directories and CUE sheets are supported as inputs", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("no CUE sheets found")]
    NoInput,

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The extraction program cannot be run at all
    #[error("extraction tool unavailable: {0}")]
    Tool(#[from] ExtractionFailure),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}
