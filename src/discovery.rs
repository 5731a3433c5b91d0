//! Finding CUE sheets below the command-line inputs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Check if a file is a CUE file
pub fn is_cue_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("cue"))
        .unwrap_or(false)
}

/// Resolve inputs to sheet paths: files are taken as they are, directories
/// are searched recursively. Each directory contributes its sheets in name order.
pub fn find_sheets(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sheets = Vec::new();
    for input in inputs {
        let metadata = fs::metadata(input).map_err(|source| Error::Io {
            path: input.clone(),
            source,
        })?;

        if metadata.is_dir() {
            scan_dir(input, &mut sheets)?;
        } else if is_cue_file(input) {
            sheets.push(input.clone());
        } else {
            return Err(Error::UnsupportedInput(input.clone()));
        }
    }

    if sheets.is_empty() {
        return Err(Error::NoInput);
    }
    Ok(sheets)
}

fn scan_dir(dir: &Path, sheets: &mut Vec<PathBuf>) -> Result<()> {
    let io_error = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_error)?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            scan_dir(&path, sheets)?;
        } else if is_cue_file(&path) {
            debug!("Found sheet {}", path.display());
            sheets.push(path);
        }
    }
    Ok(())
}
