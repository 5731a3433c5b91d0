//! Naming templates.
//!
//! Literal text is copied as is (a `/` starts a new directory), while
//! `{scope.field | filter ...}` interpolates disc or track metadata. `{{` and
//! `}}` produce literal braces. Every interpolated value goes through
//! [`sanitize_segment`] so metadata can never introduce a separator.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    multi::many0,
    sequence::{delimited, preceded, tuple},
    IResult,
};
use thiserror::Error;

use super::sanitize::sanitize_segment;
use crate::sheet::{Disc, Track};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("syntax error at byte {offset}: {reason}")]
    Syntax { offset: usize, reason: &'static str },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("filter '{0}' requires an argument")]
    MissingArgument(String),
    #[error("filter '{0}' takes no argument")]
    UnexpectedArgument(String),
    #[error("filter 'pad' needs a numeric field, '{0}' is text")]
    NotNumeric(&'static str),
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),
    #[error("rendered path climbs out of the output directory")]
    ParentSegment,
    #[error("rendered path is empty")]
    EmptyPath,
}

/// Digits needed to print every track number of a disc with `count` tracks.
pub fn pad_width(count: usize) -> usize {
    count.checked_ilog10().map_or(1, |digits| digits as usize + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    DiscPerformer,
    DiscTitle,
    DiscDate,
    DiscGenre,
    TrackNumber,
    TrackCount,
    TrackTitle,
    TrackPerformer,
}

impl Field {
    fn lookup(name: &str) -> Option<Self> {
        let field = match name {
            "disc.performer" | "disc.artist" => Field::DiscPerformer,
            "disc.title" => Field::DiscTitle,
            "disc.date" => Field::DiscDate,
            "disc.genre" => Field::DiscGenre,
            "track.number" => Field::TrackNumber,
            "track.count" => Field::TrackCount,
            "track.title" => Field::TrackTitle,
            "track.performer" => Field::TrackPerformer,
            _ => return None,
        };
        Some(field)
    }

    fn name(self) -> &'static str {
        match self {
            Field::DiscPerformer => "disc.performer",
            Field::DiscTitle => "disc.title",
            Field::DiscDate => "disc.date",
            Field::DiscGenre => "disc.genre",
            Field::TrackNumber => "track.number",
            Field::TrackCount => "track.count",
            Field::TrackTitle => "track.title",
            Field::TrackPerformer => "track.performer",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Field::TrackNumber | Field::TrackCount)
    }

    fn number(self, disc: &Disc, track: &Track) -> Option<u64> {
        match self {
            Field::TrackNumber => Some(u64::from(track.number)),
            Field::TrackCount => Some(disc.track_count() as u64),
            _ => None,
        }
    }

    fn text(self, disc: &Disc, track: &Track) -> Option<String> {
        if let Some(number) = self.number(disc, track) {
            return Some(number.to_string());
        }
        let value = match self {
            Field::DiscPerformer => &disc.performer,
            Field::DiscTitle => &disc.title,
            Field::DiscDate => &disc.date,
            Field::DiscGenre => &disc.genre,
            Field::TrackTitle => &track.title,
            Field::TrackPerformer => &track.performer,
            Field::TrackNumber | Field::TrackCount => return None,
        };
        value.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Pad,
    Elem,
    Required,
    Or(String),
    Prefix(String),
    Suffix(String),
}

impl Filter {
    fn bind(field: Field, name: &str, arg: Option<&str>) -> Result<Self, TemplateError> {
        let filter = match (name, arg) {
            ("pad", _) if !field.is_numeric() => {
                return Err(TemplateError::NotNumeric(field.name()))
            }
            ("pad", None) => Filter::Pad,
            ("elem", None) => Filter::Elem,
            ("required", None) => Filter::Required,
            ("or", Some(text)) => Filter::Or(text.to_string()),
            ("prefix", Some(text)) => Filter::Prefix(text.to_string()),
            ("suffix", Some(text)) => Filter::Suffix(text.to_string()),
            ("pad" | "elem" | "required", Some(_)) => {
                return Err(TemplateError::UnexpectedArgument(name.to_string()))
            }
            ("or" | "prefix" | "suffix", None) => {
                return Err(TemplateError::MissingArgument(name.to_string()))
            }
            _ => return Err(TemplateError::UnknownFilter(name.to_string())),
        };
        Ok(filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Expr {
    field: Field,
    filters: Vec<Filter>,
}

impl Expr {
    fn render(&self, disc: &Disc, track: &Track) -> Result<String, TemplateError> {
        let mut value = non_empty(self.field.text(disc, track).map(|v| sanitize_segment(&v)));

        // Filters apply left to right
        for filter in &self.filters {
            match filter {
                Filter::Pad => {
                    let width = pad_width(disc.track_count());
                    value = self
                        .field
                        .number(disc, track)
                        .map(|n| format!("{n:0width$}"));
                }
                Filter::Elem => value = non_empty(value.map(|v| sanitize_segment(&v))),
                Filter::Required => {
                    if value.is_none() {
                        return Err(TemplateError::MissingField(self.field.name()));
                    }
                }
                Filter::Or(fallback) => {
                    if value.is_none() {
                        value = non_empty(Some(sanitize_segment(fallback)));
                    }
                }
                Filter::Prefix(text) => value = value.map(|v| format!("{text}{v}")),
                Filter::Suffix(text) => value = value.map(|v| format!("{v}{text}")),
            }
        }
        Ok(value.unwrap_or_default())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field(Expr),
}

/// A compiled naming template, shared by every job of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            let offset = source.len() - tail.len();

            if let Some(after) = tail.strip_prefix("{{").or_else(|| tail.strip_prefix("}}")) {
                literal.push_str(&tail[..1]);
                rest = after;
                continue;
            }
            if tail.starts_with('}') {
                return Err(TemplateError::Syntax {
                    offset,
                    reason: "unmatched '}'",
                });
            }

            let (after, (name, filters)) =
                expression(&tail[1..]).map_err(|_| TemplateError::Syntax {
                    offset,
                    reason: "expected {scope.field | filter ...}",
                })?;
            let field =
                Field::lookup(name).ok_or_else(|| TemplateError::UnknownField(name.to_string()))?;
            let filters = filters
                .into_iter()
                .map(|(name, arg)| Filter::bind(field, name, arg))
                .collect::<Result<Vec<_>, _>>()?;

            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Part::Field(Expr { field, filters }));
            rest = after;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the relative output path (without extension) of one track.
    pub fn render(&self, disc: &Disc, track: &Track) -> Result<PathBuf, TemplateError> {
        let mut rendered = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => rendered.push_str(text),
                Part::Field(expr) => rendered.push_str(&expr.render(disc, track)?),
            }
        }

        let mut path = PathBuf::new();
        for segment in rendered.split('/').map(str::trim) {
            match segment {
                "" | "." => continue,
                ".." => return Err(TemplateError::ParentSegment),
                _ => path.push(segment),
            }
        }
        if path.as_os_str().is_empty() {
            return Err(TemplateError::EmptyPath);
        }
        Ok(path)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.')(input)
}

fn filter_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_until("\""), char('"'))(input)
}

/// `name` or `name:"argument"`
fn filter(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    tuple((
        filter_name,
        opt(preceded(tuple((space0, char(':'), space0)), quoted)),
    ))(input)
}

/// Everything after an opening brace, up to and including the closing one
fn expression(input: &str) -> IResult<&str, (&str, Vec<(&str, Option<&str>)>)> {
    let (input, _) = space0(input)?;
    let (input, name) = field_name(input)?;
    let (input, filters) = many0(preceded(tuple((space0, char('|'), space0)), filter))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char('}')(input)?;
    Ok((input, (name, filters)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TEMPLATE;
    use crate::sheet::Timestamp;
    use std::path::Path;

    fn disc(performer: Option<&str>, title: Option<&str>, tracks: usize) -> Disc {
        Disc {
            sheet: PathBuf::from("album.cue"),
            source: PathBuf::from("album.flac"),
            performer: performer.map(str::to_string),
            title: title.map(str::to_string),
            date: None,
            genre: None,
            tracks: (1..=tracks as u32)
                .map(|number| Track {
                    number,
                    title: Some(format!("Song {number}")),
                    performer: None,
                    start: Timestamp::from_frames(u64::from(number) * 75),
                })
                .collect(),
        }
    }

    #[test]
    fn test_pad_width() {
        assert_eq!(pad_width(0), 1);
        assert_eq!(pad_width(9), 1);
        assert_eq!(pad_width(10), 2);
        assert_eq!(pad_width(99), 2);
        assert_eq!(pad_width(100), 3);
    }

    #[test]
    fn test_separator_in_artist_and_missing_title() {
        let template = Template::compile(
            r#"{disc.performer}/{disc.title|or:"Unknown Album"}/{track.number|pad} - {track.title}"#,
        )
        .unwrap();
        let mut disc = disc(Some("A/B"), None, 12);
        disc.tracks[2].title = Some("Solo".to_string());

        let path = template.render(&disc, &disc.tracks[2]).unwrap();
        assert_eq!(path, Path::new("A_B").join("Unknown Album").join("03 - Solo"));
    }

    #[test]
    fn test_default_template_with_date() {
        let template = Template::compile(DEFAULT_TEMPLATE).unwrap();
        let mut disc = disc(Some("Artist"), Some("Album"), 9);
        disc.date = Some("1999".to_string());

        let path = template.render(&disc, &disc.tracks[0]).unwrap();
        assert_eq!(path, Path::new("Artist").join("1999 - Album").join("1 - Song 1"));

        disc.date = None;
        let path = template.render(&disc, &disc.tracks[0]).unwrap();
        assert_eq!(path, Path::new("Artist").join("Album").join("1 - Song 1"));
    }

    #[test]
    fn test_missing_values_render_empty() {
        let template = Template::compile("{disc.genre}/{track.number} {track.performer}").unwrap();
        let disc = disc(None, None, 2);

        assert_eq!(template.render(&disc, &disc.tracks[1]).unwrap(), Path::new("2"));
    }

    #[test]
    fn test_required_field() {
        let template = Template::compile("{disc.title|required}/{track.number}").unwrap();
        let disc = disc(None, None, 1);

        assert_eq!(
            template.render(&disc, &disc.tracks[0]).unwrap_err(),
            TemplateError::MissingField("disc.title")
        );
    }

    #[test]
    fn test_metadata_cannot_inject_separators() {
        let template = Template::compile("{disc.performer}/{track.title|elem}").unwrap();
        let mut disc = disc(Some("../../etc"), None, 1);
        disc.tracks[0].title = Some("a\\b\u{1}c/..".to_string());

        let path = template.render(&disc, &disc.tracks[0]).unwrap();
        let segments: Vec<_> = path.iter().map(|s| s.to_string_lossy().into_owned()).collect();
        assert_eq!(segments, vec![".._.._etc", "a_b_c_.."]);
    }

    #[test]
    fn test_template_literal_parent_rejected() {
        let template = Template::compile("../{track.number}").unwrap();
        let disc = disc(None, None, 1);
        assert_eq!(
            template.render(&disc, &disc.tracks[0]).unwrap_err(),
            TemplateError::ParentSegment
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::compile("{{{track.number}}}").unwrap();
        let disc = disc(None, None, 1);
        assert_eq!(template.render(&disc, &disc.tracks[0]).unwrap(), Path::new("{1}"));
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(
            Template::compile("{disc.label}").unwrap_err(),
            TemplateError::UnknownField("disc.label".to_string())
        );
        assert_eq!(
            Template::compile("{disc.title|upper}").unwrap_err(),
            TemplateError::UnknownFilter("upper".to_string())
        );
        assert_eq!(
            Template::compile("{disc.title|pad}").unwrap_err(),
            TemplateError::NotNumeric("disc.title")
        );
        assert_eq!(
            Template::compile("{disc.title|or}").unwrap_err(),
            TemplateError::MissingArgument("or".to_string())
        );
        assert_eq!(
            Template::compile("{track.number|pad:\"3\"}").unwrap_err(),
            TemplateError::UnexpectedArgument("pad".to_string())
        );
        assert!(matches!(
            Template::compile("a/{disc.title").unwrap_err(),
            TemplateError::Syntax { offset: 2, .. }
        ));
        assert!(matches!(
            Template::compile("a}").unwrap_err(),
            TemplateError::Syntax { offset: 1, .. }
        ));
    }
}
