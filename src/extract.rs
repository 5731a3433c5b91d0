//! The extraction collaborator: cutting one track out of the source image.
//!
//! The scheduler only knows the [`Extractor`] trait. [`FfmpegExtractor`] is
//! the implementation the binary uses; tests substitute their own.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::boundary::TrackEnd;
use crate::config::SplitConfig;
use crate::plan::ExtractionJob;

#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{program} exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Produces the output file of one job, blocking until it is written.
pub trait Extractor: Send + Sync {
    fn extract(&self, job: &ExtractionJob) -> Result<(), ExtractionFailure>;
}

/// Decode and re-encode with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: PathBuf,
    extra_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegExtractor {
    pub fn new(config: &SplitConfig) -> Self {
        Self {
            program: config.ffmpeg.clone(),
            extra_args: config.extra_args.clone(),
            overwrite: config.overwrite,
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Check that the program can be started at all.
    pub fn probe(&self) -> Result<(), ExtractionFailure> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ExtractionFailure::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !status.success() {
            return Err(ExtractionFailure::Exited {
                program: self.program_name(),
                status,
                stderr: String::new(),
            });
        }
        Ok(())
    }

    /// The ffmpeg invocation for one job. The container follows the destination's extension.
    pub fn command(&self, job: &ExtractionJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-nostdin", "-hide_banner", "-loglevel", "error"])
            .arg(if self.overwrite { "-y" } else { "-n" })
            .arg("-i")
            .arg(job.source())
            .arg("-ss")
            .arg(job.boundary.start.to_seconds_string());
        if let TrackEnd::At(end) = job.boundary.end {
            cmd.arg("-to").arg(end.to_seconds_string());
        }
        cmd.args(["-map", "0:a", "-map_metadata", "-1"]);

        for (key, value) in tags(job) {
            cmd.arg("-metadata").arg(format!("{key}={value}"));
        }
        cmd.args(&self.extra_args).arg(&job.destination);
        cmd
    }
}

impl Extractor for FfmpegExtractor {
    fn extract(&self, job: &ExtractionJob) -> Result<(), ExtractionFailure> {
        if let Some(parent) = job.destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut cmd = self.command(job);
        debug!("Running {:?}", cmd);
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExtractionFailure::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractionFailure::Exited {
                program: self.program_name(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Tags written into the output file
fn tags(job: &ExtractionJob) -> Vec<(&'static str, String)> {
    let disc = &job.disc;
    let track = &job.track;

    let mut tags = Vec::new();
    if let Some(artist) = track.performer.as_ref().or(disc.performer.as_ref()) {
        tags.push(("artist", artist.clone()));
    }
    if let Some(performer) = &disc.performer {
        tags.push(("album_artist", performer.clone()));
    }
    if let Some(title) = &disc.title {
        tags.push(("album", title.clone()));
    }
    if let Some(title) = &track.title {
        tags.push(("title", title.clone()));
    }
    if let Some(date) = &disc.date {
        tags.push(("date", date.clone()));
    }
    if let Some(genre) = &disc.genre {
        tags.push(("genre", genre.clone()));
    }
    tags.push(("track", format!("{}/{}", track.number, disc.track_count())));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::Template;
    use crate::plan::plan_jobs;
    use crate::sheet::parse_sheet;
    use std::ffi::OsStr;

    fn jobs() -> Vec<ExtractionJob> {
        let mut disc = parse_sheet(
            "PERFORMER Band\nTITLE Record\nREM DATE 2001\nFILE \"a b.flac\" WAVE\nTRACK 01 AUDIO\nTITLE One\nINDEX 01 00:00:00\nTRACK 02 AUDIO\nTITLE Two\nPERFORMER Guest\nINDEX 01 03:00:15\n",
        )
        .unwrap();
        disc.sheet = PathBuf::from("music/a.cue");
        disc.source = PathBuf::from("music/a b.flac");

        let config = SplitConfig {
            output_dir: PathBuf::from("out"),
            format: "ogg".to_string(),
            ..SplitConfig::default()
        };
        let template = Template::compile("{track.number|pad}").unwrap();
        plan_jobs(vec![disc], &template, &config).unwrap().jobs
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_for_bounded_track() {
        let config = SplitConfig {
            extra_args: vec!["-qscale:a".to_string(), "6".to_string()],
            ..SplitConfig::default()
        };
        let extractor = FfmpegExtractor::new(&config);
        let jobs = jobs();
        let cmd = extractor.command(&jobs[0]);

        assert_eq!(cmd.get_program(), OsStr::new("ffmpeg"));
        let args = args(&cmd);
        let expected_head = [
            "-nostdin", "-hide_banner", "-loglevel", "error", "-n", "-i", "music/a b.flac", "-ss",
            "0.000000", "-to", "180.200000",
        ];
        assert_eq!(&args[..expected_head.len()], expected_head);
        assert!(args.contains(&"artist=Band".to_string()));
        assert!(args.contains(&"album=Record".to_string()));
        assert!(args.contains(&"date=2001".to_string()));
        assert!(args.contains(&"track=1/2".to_string()));

        let tail = &args[args.len() - 3..];
        assert_eq!(tail[0], "-qscale:a");
        assert_eq!(tail[1], "6");
        assert_eq!(PathBuf::from(&tail[2]), PathBuf::from("out").join("1.ogg"));
    }

    #[test]
    fn test_command_for_last_track_is_open_ended() {
        let config = SplitConfig {
            overwrite: true,
            ..SplitConfig::default()
        };
        let extractor = FfmpegExtractor::new(&config);
        let jobs = jobs();
        let args = args(&extractor.command(&jobs[1]));

        assert!(args.contains(&"-y".to_string()));
        assert!(!args.contains(&"-to".to_string()));
        assert!(args.contains(&"artist=Guest".to_string()));
        assert!(args.contains(&"album_artist=Band".to_string()));
    }

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let config = SplitConfig {
            ffmpeg: PathBuf::from("/nonexistent/cuesplit-ffmpeg"),
            ..SplitConfig::default()
        };
        let extractor = FfmpegExtractor::new(&config);

        assert!(matches!(
            extractor.probe(),
            Err(ExtractionFailure::Spawn { .. })
        ));
    }
}
