use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cuesplit::boundary::Boundary;
use cuesplit::extract::{ExtractionFailure, Extractor};
use cuesplit::plan::ExtractionJob;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Write a sheet next to an (empty) audio image and return the sheet path
pub fn write_sheet(dir: &Path, name: &str, contents: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// A sheet with tracks at 0:00, 3:00 and 7:30
pub fn three_track_sheet(performer: &str, title: &str) -> String {
    format!(
        "REM DATE 1999\nPERFORMER \"{performer}\"\nTITLE \"{title}\"\nFILE \"image.flac\" WAVE\n  TRACK 01 AUDIO\n    TITLE \"First\"\n    INDEX 01 00:00:00\n  TRACK 02 AUDIO\n    TITLE \"Second\"\n    INDEX 00 02:58:00\n    INDEX 01 03:00:00\n  TRACK 03 AUDIO\n    TITLE \"Third\"\n    INDEX 01 07:30:00\n"
    )
}

/// Calls made to a [`RecordingExtractor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub sheet: PathBuf,
    pub source: PathBuf,
    pub track: u32,
    pub boundary: Boundary,
    pub destination: PathBuf,
}

/// Records every job and succeeds, except for the listed track numbers.
#[derive(Default)]
pub struct RecordingExtractor {
    pub calls: Mutex<Vec<Call>>,
    pub fail_tracks: Vec<u32>,
}

impl RecordingExtractor {
    pub fn failing(tracks: &[u32]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_tracks: tracks.to_vec(),
        }
    }

    /// Calls sorted by destination; completion order is not deterministic
    pub fn calls(&self) -> Vec<Call> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_by(|a, b| a.destination.cmp(&b.destination));
        calls
    }
}

impl Extractor for RecordingExtractor {
    fn extract(&self, job: &ExtractionJob) -> Result<(), ExtractionFailure> {
        self.calls.lock().unwrap().push(Call {
            sheet: job.sheet().to_path_buf(),
            source: job.source().to_path_buf(),
            track: job.track.number,
            boundary: job.boundary,
            destination: job.destination.clone(),
        });
        if self.fail_tracks.contains(&job.track.number) {
            return Err(ExtractionFailure::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "encoder crashed",
            )));
        }
        Ok(())
    }
}
