use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cuesplit::boundary::Boundary;
use cuesplit::config::{self, SplitConfig};
use cuesplit::discovery::find_sheets;
use cuesplit::extract::FfmpegExtractor;
use cuesplit::plan::{self, ExtractionJob, Plan};
use cuesplit::scheduler::{RunSummary, Scheduler};
use cuesplit::sheet::Disc;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Split disc images into tracks using their CUE sheets.
///
/// INPUT is either a directory, searched recursively for CUE sheets, or a CUE
/// sheet file. Without inputs the current directory is used.
#[derive(Parser, Debug)]
#[command(name = "cuesplit")]
#[command(version)]
struct Args {
    /// Output directory
    #[arg(short, long, default_value = ".", env = "CUESPLIT_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Output format, e.g. "ogg"; anything ffmpeg can write
    #[arg(short, long, default_value = config::DEFAULT_FORMAT, env = "CUESPLIT_FORMAT")]
    format: String,

    /// File naming template
    #[arg(short, long = "name", default_value = config::DEFAULT_TEMPLATE, env = "CUESPLIT_TEMPLATE")]
    name: String,

    /// Extract specific track(s), e.g. "-t 1 -t 2"
    #[arg(short, long = "track", value_name = "NUMBER")]
    tracks: Vec<u32>,

    /// Add an argument to ffmpeg, e.g. "-F -qscale:a -F 2"
    #[arg(short = 'F', long = "ffmpeg-arg", value_name = "ARG", allow_hyphen_values = true)]
    ffmpeg_args: Vec<String>,

    /// Number of tracks extracted in parallel [default: number of CPUs]
    #[arg(long, env = "CUESPLIT_JOBS")]
    jobs: Option<usize>,

    /// ffmpeg executable
    #[arg(long, default_value = config::DEFAULT_FFMPEG, env = "CUESPLIT_FFMPEG")]
    ffmpeg: PathBuf,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Print what would be extracted without running ffmpeg
    #[arg(short, long)]
    dry_run: bool,

    /// Dump the parsed sheets, the planned jobs and the run summary as JSON
    #[arg(short, long)]
    json: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,

    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,
}

impl Args {
    fn config(&self) -> SplitConfig {
        SplitConfig {
            template: self.name.clone(),
            output_dir: self.output_dir.clone(),
            format: self.format.clone(),
            extra_args: self.ffmpeg_args.clone(),
            tracks: self.tracks.clone(),
            concurrency: self.jobs.unwrap_or_else(config::default_concurrency),
            overwrite: self.overwrite,
            ffmpeg: self.ffmpeg.clone(),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG takes precedence over --quiet
    let default_level = if args.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> cuesplit::Result<()> {
    let config = args.config();
    let inputs = if args.inputs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.inputs.clone()
    };

    let sheets = find_sheets(&inputs)?;
    info!("Found {} CUE sheets", sheets.len());
    let Plan { discs, jobs } = plan::prepare(&sheets, &config)?;
    let planned = job_reports(&jobs);

    let mut summary = None;
    if args.dry_run {
        for job in &jobs {
            println!(
                "{} track {} [{} - {}] -> {}",
                job.sheet().display(),
                job.track.number,
                job.boundary.start,
                job.boundary.end,
                job.destination.display()
            );
        }
    } else {
        let extractor = FfmpegExtractor::new(&config);
        extractor.probe()?;

        let scheduler = Scheduler::new(config.concurrency)?;
        let done = scheduler.run(jobs, &extractor)?;
        info!("✓ Successfully split {} tracks", done.succeeded);
        summary = Some(done);
    }

    if args.json {
        let report = Report {
            discs: discs.iter().map(|disc| disc.as_ref()).collect(),
            jobs: planned,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// The `--json` document
#[derive(Serialize)]
struct Report<'a> {
    discs: Vec<&'a Disc>,
    jobs: Vec<JobReport>,
    /// Absent on a dry run
    summary: Option<RunSummary>,
}

#[derive(Serialize)]
struct JobReport {
    sheet: PathBuf,
    track: u32,
    boundary: Boundary,
    destination: PathBuf,
}

fn job_reports(jobs: &[ExtractionJob]) -> Vec<JobReport> {
    jobs.iter()
        .map(|job| JobReport {
            sheet: job.sheet().to_path_buf(),
            track: job.track.number,
            boundary: job.boundary,
            destination: job.destination.clone(),
        })
        .collect()
}
