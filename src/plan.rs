//! Turning sheets into extraction jobs.
//!
//! Planning is all-or-nothing: every sheet is parsed, every boundary checked
//! and every destination rendered before the first job runs, so a broken
//! sheet anywhere in the batch stops the invocation with nothing written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::boundary::{boundaries, Boundary};
use crate::config::SplitConfig;
use crate::error::{Error, Result};
use crate::naming::Template;
use crate::sheet::{load_sheet, Disc, Track};

/// One output file to produce.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub disc: Arc<Disc>,
    pub track: Track,
    pub boundary: Boundary,
    /// `output_dir/<rendered template>.<format>`
    pub destination: PathBuf,
}

impl ExtractionJob {
    pub fn sheet(&self) -> &Path {
        &self.disc.sheet
    }

    pub fn source(&self) -> &Path {
        &self.disc.source
    }
}

/// Everything an invocation will do.
#[derive(Debug)]
pub struct Plan {
    pub discs: Vec<Arc<Disc>>,
    pub jobs: Vec<ExtractionJob>,
}

/// Compile the template, load the sheets in order and plan their jobs.
pub fn prepare(sheets: &[PathBuf], config: &SplitConfig) -> Result<Plan> {
    let template = Template::compile(&config.template).map_err(Error::Template)?;
    let discs = sheets
        .iter()
        .map(|path| load_sheet(path))
        .collect::<Result<Vec<_>>>()?;
    plan_jobs(discs, &template, config)
}

pub fn plan_jobs(discs: Vec<Disc>, template: &Template, config: &SplitConfig) -> Result<Plan> {
    let mut planned = Vec::with_capacity(discs.len());
    let mut jobs = Vec::new();
    // Keyed case-insensitively: several common filesystems fold case
    let mut claimed: HashMap<String, (PathBuf, u32)> = HashMap::new();

    for disc in discs {
        let disc = Arc::new(disc);
        let windows = boundaries(&disc).map_err(|source| Error::Validation {
            path: disc.sheet.clone(),
            source,
        })?;

        for (track, boundary) in windows {
            if !config.selects(track.number) {
                debug!("Skipping track {} of {}", track.number, disc.sheet.display());
                continue;
            }

            let relative = template.render(&disc, track).map_err(|source| Error::Render {
                path: disc.sheet.clone(),
                track: track.number,
                source,
            })?;
            let destination = destination_path(&config.output_dir, relative, &config.format);

            let key = destination.to_string_lossy().to_lowercase();
            if let Some((first, first_track)) = claimed.get(&key) {
                return Err(Error::DuplicateDestination {
                    destination,
                    first: first.clone(),
                    first_track: *first_track,
                    second: disc.sheet.clone(),
                    second_track: track.number,
                });
            }
            claimed.insert(key, (disc.sheet.clone(), track.number));

            jobs.push(ExtractionJob {
                disc: Arc::clone(&disc),
                track: track.clone(),
                boundary,
                destination,
            });
        }
        planned.push(disc);
    }

    info!("Planned {} tracks from {} sheets", jobs.len(), planned.len());
    Ok(Plan {
        discs: planned,
        jobs,
    })
}

/// Append the extension rather than `set_extension`, which would eat a dotted title.
fn destination_path(output_dir: &Path, relative: PathBuf, format: &str) -> PathBuf {
    let mut name = relative.into_os_string();
    if !format.is_empty() {
        name.push(".");
        name.push(format);
    }
    output_dir.join(name)
}
