use std::path::PathBuf;

/// Lays tracks out as `Artist/[Date - ]Album/NN - Title`.
pub const DEFAULT_TEMPLATE: &str = r#"{disc.performer}/{disc.date|suffix:" - "}{disc.title|or:"Unknown Album"}/{track.number|pad} - {track.title}"#;

pub const DEFAULT_FORMAT: &str = "flac";

pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Options of one split invocation.
///
/// Built once (by the CLI or a caller of the library) and passed by reference
/// to the loader, the planner, the extractor and the scheduler.
#[derive(Clone, Debug)]
pub struct SplitConfig {
    /// Naming template, see [`crate::naming::Template`]
    pub template: String,
    /// Root directory of the rendered paths
    pub output_dir: PathBuf,
    /// Output container, also used as the file extension
    pub format: String,
    /// Extra arguments handed to the extractor as is
    pub extra_args: Vec<String>,
    /// Track numbers to extract; empty means every track
    pub tracks: Vec<u32>,
    /// Worker pool size
    pub concurrency: usize,
    /// Replace existing output files instead of failing
    pub overwrite: bool,
    /// Extraction program
    pub ffmpeg: PathBuf,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            output_dir: PathBuf::from("."),
            format: DEFAULT_FORMAT.to_string(),
            extra_args: Vec::new(),
            tracks: Vec::new(),
            concurrency: default_concurrency(),
            overwrite: false,
            ffmpeg: PathBuf::from(DEFAULT_FFMPEG),
        }
    }
}

impl SplitConfig {
    /// Whether the selected-track filter lets `number` through.
    pub fn selects(&self, number: u32) -> bool {
        self.tracks.is_empty() || self.tracks.contains(&number)
    }
}

/// One worker per available core.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_filter() {
        let mut config = SplitConfig::default();
        assert!(config.selects(7));

        config.tracks = vec![1, 3];
        assert!(config.selects(3));
        assert!(!config.selects(2));
    }

    #[test]
    fn test_defaults() {
        let config = SplitConfig::default();
        assert_eq!(config.format, "flac");
        assert!(config.concurrency >= 1);
        assert!(!config.overwrite);
    }
}
