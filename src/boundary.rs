//! Extraction windows for the tracks of a disc.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::sheet::{Disc, Timestamp, Track};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("disc has no tracks")]
    NoTracks,
    #[error("track {number} is empty: it starts at {start} and ends at {end}")]
    EmptyTrack {
        number: u32,
        start: Timestamp,
        end: Timestamp,
    },
}

/// Exclusive end of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackEnd {
    At(Timestamp),
    /// Until the source runs out; the extractor resolves it.
    Open,
}

impl fmt::Display for TrackEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackEnd::At(end) => write!(f, "{end}"),
            TrackEnd::Open => f.write_str("end"),
        }
    }
}

/// The `[start, end)` window of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Boundary {
    pub start: Timestamp,
    pub end: TrackEnd,
}

impl Boundary {
    /// `(start, end)` in milliseconds, `None` for an open end.
    pub fn as_millis(&self) -> (u64, Option<u64>) {
        let end = match self.end {
            TrackEnd::At(end) => Some(end.as_millis()),
            TrackEnd::Open => None,
        };
        (self.start.as_millis(), end)
    }

    /// Length of the window, unknown for the last track.
    pub fn duration(&self) -> Option<Timestamp> {
        match self.end {
            TrackEnd::At(end) => Some(Timestamp::from_frames(end.frames() - self.start.frames())),
            TrackEnd::Open => None,
        }
    }
}

/// Each track ends where the next one starts; the last one is open-ended.
pub fn boundaries(disc: &Disc) -> Result<Vec<(&Track, Boundary)>, ValidationError> {
    if disc.tracks.is_empty() {
        return Err(ValidationError::NoTracks);
    }

    let mut windows = Vec::with_capacity(disc.tracks.len());
    for (i, track) in disc.tracks.iter().enumerate() {
        let end = match disc.tracks.get(i + 1) {
            Some(next) if next.start <= track.start => {
                return Err(ValidationError::EmptyTrack {
                    number: track.number,
                    start: track.start,
                    end: next.start,
                });
            }
            Some(next) => TrackEnd::At(next.start),
            None => TrackEnd::Open,
        };
        windows.push((
            track,
            Boundary {
                start: track.start,
                end,
            },
        ));
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::parse_sheet;

    #[test]
    fn test_three_track_windows_in_millis() {
        let disc = parse_sheet(
            "FILE a.flac WAVE\nTRACK 01 AUDIO\nINDEX 01 00:00:00\nTRACK 02 AUDIO\nINDEX 01 03:00:00\nTRACK 03 AUDIO\nINDEX 01 07:30:00\n",
        )
        .unwrap();

        let millis: Vec<_> = boundaries(&disc)
            .unwrap()
            .iter()
            .map(|(_, b)| b.as_millis())
            .collect();
        assert_eq!(
            millis,
            vec![(0, Some(180000)), (180000, Some(450000)), (450000, None)]
        );
    }

    #[test]
    fn test_windows_are_non_empty() {
        let disc = parse_sheet(
            "FILE a.flac WAVE\nTRACK 01 AUDIO\nINDEX 01 00:00:10\nTRACK 02 AUDIO\nINDEX 01 00:00:11\n",
        )
        .unwrap();
        let windows = boundaries(&disc).unwrap();

        assert_eq!(windows[0].1.duration(), Some(Timestamp::from_frames(1)));
        assert_eq!(windows[1].1.end, TrackEnd::Open);
        assert_eq!(windows[0].0.number, 1);
    }

    #[test]
    fn test_shared_start_rejected() {
        let disc = parse_sheet(
            "FILE a.flac WAVE\nTRACK 01 AUDIO\nINDEX 01 01:00:00\nTRACK 02 AUDIO\nINDEX 01 01:00:00\n",
        )
        .unwrap();

        assert_eq!(
            boundaries(&disc).unwrap_err(),
            ValidationError::EmptyTrack {
                number: 1,
                start: Timestamp::parse("01:00:00").unwrap(),
                end: Timestamp::parse("01:00:00").unwrap(),
            }
        );
    }

    #[test]
    fn test_deterministic() {
        let disc = parse_sheet(
            "FILE a.flac WAVE\nTRACK 01 AUDIO\nINDEX 01 00:00:00\nTRACK 02 AUDIO\nINDEX 01 00:30:00\n",
        )
        .unwrap();
        assert_eq!(boundaries(&disc).unwrap(), boundaries(&disc).unwrap());
    }
}
