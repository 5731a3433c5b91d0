//! CUE sheet parsing.
//!
//! A sheet is read line by line. Disc-level fields (`PERFORMER`, `TITLE`,
//! `REM DATE`, `REM GENRE`, `FILE`) appear before the first `TRACK`; every
//! field after a `TRACK` line belongs to that track until the next one.
//! Unrecognized commands are skipped.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{digit1, space0, space1},
    combinator::{all_consuming, map_res, opt},
    sequence::{delimited, preceded, separated_pair, terminated, tuple},
    IResult,
};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTime { line: usize, value: String },
    #[error("line {line}: malformed {command} field")]
    Malformed { line: usize, command: String },
    #[error("line {line}: {field} specified twice")]
    Duplicate { line: usize, field: &'static str },
    #[error("line {line}: invalid track number '{value}'")]
    InvalidTrackNumber { line: usize, value: String },
    #[error("line {line}: track {number} does not follow track {previous}")]
    TrackOrder {
        line: usize,
        number: u32,
        previous: u32,
    },
    #[error("line {line}: track {number} starts before track {previous}")]
    OffsetDecreasing {
        line: usize,
        number: u32,
        previous: u32,
    },
    #[error("line {line}: track {number} has no INDEX 01")]
    MissingIndex { line: usize, number: u32 },
    #[error("line {line}: {command} outside of a track")]
    OutsideTrack { line: usize, command: &'static str },
    #[error("line {line}: TRACK before any FILE")]
    TrackBeforeFile { line: usize },
    #[error("line {line}: sheet references more than one FILE")]
    MultipleFiles { line: usize },
    #[error("sheet contains no tracks")]
    NoTracks,
}

/// Position within the source audio, counted in CD frames (75 per second).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const FRAMES_PER_SECOND: u64 = 75;
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_frames(frames: u64) -> Self {
        Self(frames)
    }

    /// Build from `mm:ss:ff` components. Seconds must be below 60 and frames below 75.
    pub fn from_msf(minutes: u64, seconds: u64, frames: u64) -> Option<Self> {
        if seconds >= 60 || frames >= Self::FRAMES_PER_SECOND {
            return None;
        }
        minutes
            .checked_mul(60)?
            .checked_add(seconds)?
            .checked_mul(Self::FRAMES_PER_SECOND)?
            .checked_add(frames)
            .map(Self)
    }

    /// Parse `mm:ss:ff`.
    pub fn parse(text: &str) -> Option<Self> {
        let (_, (minutes, seconds, frames)) = all_consuming(msf)(text).ok()?;
        Self::from_msf(minutes, seconds, frames)
    }

    pub const fn frames(self) -> u64 {
        self.0
    }

    /// Whole milliseconds, truncated. Saturates at `u64::MAX`.
    pub fn as_millis(self) -> u64 {
        let millis = u128::from(self.0) * 1000 / u128::from(Self::FRAMES_PER_SECOND);
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    /// Seconds with microsecond precision, the form ffmpeg takes for `-ss` and `-to`.
    pub fn to_seconds_string(self) -> String {
        let seconds = self.0 / Self::FRAMES_PER_SECOND;
        let micros = self.0 % Self::FRAMES_PER_SECOND * 1_000_000 / Self::FRAMES_PER_SECOND;
        format!("{seconds}.{micros:06}")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.0 / Self::FRAMES_PER_SECOND;
        write!(
            f,
            "{:02}:{:02}:{:02}",
            seconds / 60,
            seconds % 60,
            self.0 % Self::FRAMES_PER_SECOND
        )
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One extractable segment of a disc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    /// 1-based number as written in the sheet
    pub number: u32,
    pub title: Option<String>,
    pub performer: Option<String>,
    /// `INDEX 01` of the track
    pub start: Timestamp,
}

/// A parsed sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disc {
    /// Sheet file this disc was read from (empty when parsed from bare text)
    pub sheet: PathBuf,
    /// Audio image the tracks are cut from
    pub source: PathBuf,
    pub performer: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub genre: Option<String>,
    /// Ordered by strictly increasing number, non-decreasing start
    pub tracks: Vec<Track>,
}

impl Disc {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Read a sheet from disk and resolve its `FILE` against the sheet's directory.
pub fn load_sheet(path: &Path) -> Result<Disc> {
    let bytes = fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_text(&bytes, path);

    let mut disc = parse_sheet(&text).map_err(|source| Error::Format {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent() {
        disc.source = dir.join(&disc.source);
    }
    disc.sheet = path.to_path_buf();

    debug!(
        "Parsed {}: {} tracks from {}",
        path.display(),
        disc.track_count(),
        disc.source.display()
    );
    Ok(disc)
}

/// Sheets are often written by Windows rippers in a legacy code page.
fn decode_text(bytes: &[u8], path: &Path) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_owned();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            "Decoding errors occurred while reading {} with encoding {}",
            path.display(),
            encoding.name()
        );
    }
    decoded.into_owned()
}

/// Parse sheet text into a [`Disc`]. The disc's `source` is the `FILE` value as written.
pub fn parse_sheet(text: &str) -> std::result::Result<Disc, FormatError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut builder = SheetBuilder::default();
    for (index, raw) in text.split('\n').enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        builder.line(index + 1, line)?;
    }
    builder.finish()
}

struct PendingTrack {
    number: u32,
    line: usize,
    title: Option<String>,
    performer: Option<String>,
    start: Option<(Timestamp, usize)>,
}

#[derive(Default)]
struct SheetBuilder {
    file: Option<String>,
    performer: Option<String>,
    title: Option<String>,
    date: Option<String>,
    genre: Option<String>,
    tracks: Vec<Track>,
    pending: Option<PendingTrack>,
}

impl SheetBuilder {
    fn line(&mut self, line: usize, text: &str) -> std::result::Result<(), FormatError> {
        let (args, keyword) = command(text).map_err(|_| malformed(line, text))?;
        let keyword = keyword.to_ascii_uppercase();

        match keyword.as_str() {
            "FILE" => {
                let (_, name) = all_consuming(terminated(file_args, space0))(args)
                    .map_err(|_| malformed(line, "FILE"))?;
                if self.file.is_some() {
                    return Err(FormatError::MultipleFiles { line });
                }
                self.file = Some(name.to_string());
            }
            "TRACK" => self.start_track(line, args)?,
            "INDEX" => self.index(line, args)?,
            "PERFORMER" | "TITLE" => {
                let value = field_value(args).ok_or_else(|| malformed(line, &keyword))?;
                let (slot, field) = match (&mut self.pending, keyword.as_str()) {
                    (Some(track), "PERFORMER") => (&mut track.performer, "PERFORMER"),
                    (Some(track), _) => (&mut track.title, "TITLE"),
                    (None, "PERFORMER") => (&mut self.performer, "PERFORMER"),
                    (None, _) => (&mut self.title, "TITLE"),
                };
                set_once(slot, value, field, line)?;
            }
            // REM DATE and REM GENRE only describe the disc
            "REM" if self.pending.is_none() && self.tracks.is_empty() => {
                let Ok((value, sub)) = command(args) else {
                    return Ok(());
                };
                let (slot, field) = match sub.to_ascii_uppercase().as_str() {
                    "DATE" => (&mut self.date, "REM DATE"),
                    "GENRE" => (&mut self.genre, "REM GENRE"),
                    _ => return Ok(()),
                };
                let value = field_value(value).ok_or_else(|| malformed(line, field))?;
                set_once(slot, value, field, line)?;
            }
            _ => debug!("Skipping line {}: {}", line, keyword),
        }
        Ok(())
    }

    fn start_track(&mut self, line: usize, args: &str) -> std::result::Result<(), FormatError> {
        self.finish_track()?;
        if self.file.is_none() {
            return Err(FormatError::TrackBeforeFile { line });
        }

        let (_, digits) = all_consuming(terminated(track_args, space0))(args)
            .map_err(|_| malformed(line, "TRACK"))?;
        let number = digits
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| FormatError::InvalidTrackNumber {
                line,
                value: digits.to_string(),
            })?;
        if let Some(previous) = self.tracks.last() {
            if number <= previous.number {
                return Err(FormatError::TrackOrder {
                    line,
                    number,
                    previous: previous.number,
                });
            }
        }

        self.pending = Some(PendingTrack {
            number,
            line,
            title: None,
            performer: None,
            start: None,
        });
        Ok(())
    }

    fn index(&mut self, line: usize, args: &str) -> std::result::Result<(), FormatError> {
        let Some(track) = self.pending.as_mut() else {
            return Err(FormatError::OutsideTrack {
                line,
                command: "INDEX",
            });
        };

        let (_, (index, time)) =
            all_consuming(terminated(index_args, space0))(args).map_err(|_| malformed(line, "INDEX"))?;
        let index = index.parse::<u32>().map_err(|_| malformed(line, "INDEX"))?;
        let start = Timestamp::parse(time).ok_or_else(|| FormatError::InvalidTime {
            line,
            value: time.to_string(),
        })?;

        // Pregap (INDEX 00) and subindexes do not move the track start
        if index != 1 {
            return Ok(());
        }
        if track.start.is_some() {
            return Err(FormatError::Duplicate {
                line,
                field: "INDEX 01",
            });
        }
        track.start = Some((start, line));
        Ok(())
    }

    fn finish_track(&mut self) -> std::result::Result<(), FormatError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let (start, index_line) = pending.start.ok_or(FormatError::MissingIndex {
            line: pending.line,
            number: pending.number,
        })?;
        if let Some(previous) = self.tracks.last() {
            if start < previous.start {
                return Err(FormatError::OffsetDecreasing {
                    line: index_line,
                    number: pending.number,
                    previous: previous.number,
                });
            }
        }

        self.tracks.push(Track {
            number: pending.number,
            title: pending.title,
            performer: pending.performer,
            start,
        });
        Ok(())
    }

    fn finish(mut self) -> std::result::Result<Disc, FormatError> {
        self.finish_track()?;
        if self.tracks.is_empty() {
            return Err(FormatError::NoTracks);
        }
        let source = self.file.map(PathBuf::from).unwrap_or_default();

        Ok(Disc {
            sheet: PathBuf::new(),
            source,
            performer: self.performer,
            title: self.title,
            date: self.date,
            genre: self.genre,
            tracks: self.tracks,
        })
    }
}

fn malformed(line: usize, command: &str) -> FormatError {
    FormatError::Malformed {
        line,
        command: command.to_string(),
    }
}

fn set_once(
    slot: &mut Option<String>,
    value: String,
    field: &'static str,
    line: usize,
) -> std::result::Result<(), FormatError> {
    if slot.is_some() {
        return Err(FormatError::Duplicate { line, field });
    }
    *slot = Some(value);
    Ok(())
}

/// Split the leading keyword off a line
fn command(input: &str) -> IResult<&str, &str> {
    terminated(take_while1(|c: char| !c.is_whitespace()), space0)(input)
}

/// Parse quoted string
fn quoted_string(input: &str) -> IResult<&str, &str> {
    delimited(tag("\""), take_until("\""), tag("\""))(input)
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '"')(input)
}

/// A quoted string standing alone, or the unquoted remainder of the line.
fn field_value(args: &str) -> Option<String> {
    if args.starts_with('"') {
        all_consuming(terminated(quoted_string, space0))(args)
            .ok()
            .map(|(_, value)| value.to_string())
    } else if !args.is_empty() && !args.contains('"') {
        Some(args.to_string())
    } else {
        None
    }
}

/// `FILE "name" TYPE`, type optional
fn file_args(input: &str) -> IResult<&str, &str> {
    terminated(
        alt((quoted_string, bare_token)),
        opt(preceded(space1, bare_token)),
    )(input)
}

/// `TRACK nn TYPE`, type optional
fn track_args(input: &str) -> IResult<&str, &str> {
    terminated(digit1, opt(preceded(space1, bare_token)))(input)
}

/// `INDEX nn mm:ss:ff`
fn index_args(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(digit1, space1, take_while1(|c: char| !c.is_whitespace()))(input)
}

fn number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

/// Time in MM:SS:FF format
fn msf(input: &str) -> IResult<&str, (u64, u64, u64)> {
    tuple((number, preceded(tag(":"), number), preceded(tag(":"), number)))(input)
}
