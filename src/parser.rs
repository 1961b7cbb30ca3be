//! Strip definition file parser.
//!
//! The definition file is line oriented. Blank lines and lines starting with
//! `#` (after indentation) are ignored; every other line is a directive
//! keyword followed by an optional free-text value:
//!
//! ```text
//! strip xkcd
//!     name XKCD
//!     artist Randall Munroe
//!     homepage https://xkcd.com/
//!     searchpattern <img src="(?P<result>//imgs.xkcd.com/comics/[^"]+)"
//!     baseurl https:
//!     extra_txt Title Text|<img src="//imgs[^"]+" title="(?P<result>[^"]+)"
//! end
//!
//! group daily
//!     xkcd
//! end
//! ```
//!
//! ## State machine
//!
//! Parsing is a fold over lines with a [`ParserState`] that is either outside
//! any block, inside a strip, or inside a group. Each state owns the entity
//! under construction, so "a strip and a group both open" cannot be
//! expressed.
//!
//! ## Deferred group resolution
//!
//! Groups may name strips defined later in the file. Group members are kept
//! as raw ids (with the line they appeared on) and checked against the full
//! strip set only after the last line has been consumed.
//!
//! ## Value handling
//!
//! The line's indentation is removed, the keyword is split off at the first
//! run of whitespace, and the value is right-trimmed. Strip and group ids are
//! lower-cased; all other values keep their casing.

use crate::collection::Collection;
use crate::intermediate::{Intermediate, IntermediateMode};
use crate::pattern::{MAIN_STRIP_TITLE, Pattern, PatternKind};
use crate::strip::{Group, Strip};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// `baseurl` value that stands for the strip's own homepage.
pub const HOMEPAGE_SENTINEL: &str = "$homepage";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{origin}: line {line}: {kind}{}", full_line_suffix(.text))]
    Parse {
        origin: String,
        line: usize,
        kind: ParseErrorKind,
        text: Option<String>,
    },
}

fn full_line_suffix(text: &Option<String>) -> String {
    match text {
        Some(t) => format!(" - Full line: {t}"),
        None => String::new(),
    }
}

impl ConfigError {
    /// The parse failure kind, if this is a parse error.
    pub fn kind(&self) -> Option<&ParseErrorKind> {
        match self {
            ConfigError::Parse { kind, .. } => Some(kind),
            ConfigError::Io(_) => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Parse { line, .. } => Some(*line),
            ConfigError::Io(_) => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("Found \"{0}\" without ID")]
    MissingId(&'static str),
    #[error("Duplicate strip \"{0}\" found")]
    DuplicateStrip(String),
    #[error("Duplicate group \"{0}\" found")]
    DuplicateGroup(String),
    #[error("Expecting \"strip\" or \"group\"")]
    ExpectedBlock,
    #[error("Invalid strip \"{id}\": {reason}")]
    InvalidStrip { id: String, reason: InvalidReason },
    #[error("Missing option data")]
    MissingOptionData,
    #[error("Unknown option \"{0}\"")]
    UnknownOption(String),
    #[error("Incomplete {0} stanza")]
    IncompleteExtra(String),
    #[error("\"intermediate_relative\" and \"intermediate_needs_hostname\" cannot both be set")]
    ConflictingIntermediateModes,
    #[error("Unknown group line")]
    UnknownGroupLine,
    #[error("Strip \"{0}\" was never closed")]
    UnclosedStrip(String),
    #[error("Group \"{0}\" was never closed")]
    UnclosedGroup(String),
    #[error("Group \"{group}\" - strip \"{strip}\" is unknown")]
    UnknownGroupMember { group: String, strip: String },
}

/// Why a strip block failed validation at its `end` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    MissingName,
    MissingHomepage,
    MissingSearchPattern,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidReason::MissingName => "No name defined",
            InvalidReason::MissingHomepage => "No homepage defined",
            InvalidReason::MissingSearchPattern => "No searchpattern defined",
        })
    }
}

/// A strip block that has been opened but not yet closed.
#[derive(Debug, Default)]
struct StripDraft {
    id: String,
    name: Option<String>,
    artist: Option<String>,
    homepage: Option<String>,
    search_page: Option<String>,
    search_pattern: Option<String>,
    intermediate_pattern: Option<String>,
    intermediate_mode: Option<IntermediateMode>,
    base_url: String,
    on_hold: bool,
    extras: Vec<Pattern>,
}

impl StripDraft {
    fn new(id: String) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Validate and freeze into a [`Strip`]: default the search page, resolve
    /// the `$homepage` sentinel, and push the base URL into every pattern.
    fn finish(self) -> Result<Strip, InvalidReason> {
        let name = self.name.ok_or(InvalidReason::MissingName)?;
        let homepage = self.homepage.ok_or(InvalidReason::MissingHomepage)?;
        let search_pattern = self
            .search_pattern
            .ok_or(InvalidReason::MissingSearchPattern)?;

        let base_url = if self.base_url == HOMEPAGE_SENTINEL {
            homepage.clone()
        } else {
            self.base_url
        };

        let mut patterns = Vec::with_capacity(self.extras.len() + 1);
        patterns.push(Pattern::image(MAIN_STRIP_TITLE, search_pattern));
        patterns.extend(self.extras);
        for pattern in &mut patterns {
            pattern.base_url = base_url.clone();
        }

        let mode = self.intermediate_mode.unwrap_or_default();
        Ok(Strip {
            id: self.id,
            search_page: self.search_page.unwrap_or_else(|| homepage.clone()),
            name,
            artist: self.artist,
            homepage,
            base_url,
            on_hold: self.on_hold,
            intermediate: self
                .intermediate_pattern
                .map(|regex| Intermediate::new(regex, mode)),
            patterns,
            error: None,
            fetch_attempted: false,
        })
    }

    /// Record an intermediate flag; the two non-default modes exclude each other.
    fn set_mode(&mut self, mode: IntermediateMode) -> Result<(), ParseErrorKind> {
        match self.intermediate_mode {
            Some(existing) if existing != mode => Err(ParseErrorKind::ConflictingIntermediateModes),
            _ => {
                self.intermediate_mode = Some(mode);
                Ok(())
            }
        }
    }
}

/// A group block: member ids are not checked until the whole file is read.
#[derive(Debug)]
struct GroupDraft {
    id: String,
    line: usize,
    members: Vec<(String, usize)>,
}

#[derive(Debug)]
enum ParserState {
    Outer,
    InStrip(StripDraft),
    InGroup(GroupDraft),
}

/// Split a left-trimmed line into keyword and right-trimmed value.
fn split_directive(line: &str) -> (&str, Option<&str>) {
    match line.find(char::is_whitespace) {
        Some(pos) => {
            let value = line[pos..].trim();
            if value.is_empty() {
                (&line[..pos], None)
            } else {
                (&line[..pos], Some(value))
            }
        }
        None => (line, None),
    }
}

struct Parser<'a> {
    origin: &'a str,
    strips: HashMap<String, Strip>,
    groups: Vec<GroupDraft>,
    group_ids: HashSet<String>,
}

impl<'a> Parser<'a> {
    fn new(origin: &'a str) -> Self {
        Self {
            origin,
            strips: HashMap::new(),
            groups: Vec::new(),
            group_ids: HashSet::new(),
        }
    }

    fn error(&self, line: usize, kind: ParseErrorKind, text: Option<&str>) -> ConfigError {
        ConfigError::Parse {
            origin: self.origin.to_string(),
            line,
            kind,
            text: text.map(str::to_string),
        }
    }

    fn outer_line(
        &mut self,
        no: usize,
        line: &str,
        keyword: &str,
        value: Option<&str>,
    ) -> Result<ParserState, ConfigError> {
        match keyword {
            "strip" => {
                let id = value
                    .ok_or_else(|| self.error(no, ParseErrorKind::MissingId("strip"), Some(line)))?
                    .to_lowercase();
                if self.strips.contains_key(&id) {
                    return Err(self.error(no, ParseErrorKind::DuplicateStrip(id), Some(line)));
                }
                Ok(ParserState::InStrip(StripDraft::new(id)))
            }
            "group" => {
                let id = value
                    .ok_or_else(|| self.error(no, ParseErrorKind::MissingId("group"), Some(line)))?
                    .to_lowercase();
                if self.group_ids.contains(&id) {
                    return Err(self.error(no, ParseErrorKind::DuplicateGroup(id), Some(line)));
                }
                Ok(ParserState::InGroup(GroupDraft {
                    id,
                    line: no,
                    members: Vec::new(),
                }))
            }
            _ => Err(self.error(no, ParseErrorKind::ExpectedBlock, Some(line))),
        }
    }

    fn strip_line(
        &mut self,
        mut draft: StripDraft,
        no: usize,
        line: &str,
        keyword: &str,
        value: Option<&str>,
    ) -> Result<ParserState, ConfigError> {
        if keyword == "end" {
            let id = draft.id.clone();
            let strip = draft.finish().map_err(|reason| {
                self.error(no, ParseErrorKind::InvalidStrip { id, reason }, None)
            })?;
            debug!("Parsed strip \"{} ({})\"", strip.name, strip.id);
            self.strips.insert(strip.id.clone(), strip);
            return Ok(ParserState::Outer);
        }

        let Some(value) = value else {
            let flag = match keyword {
                "onhold" => {
                    draft.on_hold = true;
                    Ok(())
                }
                "intermediate_relative" => draft.set_mode(IntermediateMode::RelativeToSearchPage),
                "intermediate_needs_hostname" => {
                    draft.set_mode(IntermediateMode::NeedsHostnameFromSearchPage)
                }
                _ => Err(ParseErrorKind::MissingOptionData),
            };
            flag.map_err(|kind| self.error(no, kind, Some(line)))?;
            return Ok(ParserState::InStrip(draft));
        };

        match keyword {
            "name" => draft.name = Some(value.to_string()),
            "artist" => draft.artist = Some(value.to_string()),
            "homepage" => draft.homepage = Some(value.to_string()),
            "searchpage" => draft.search_page = Some(value.to_string()),
            "searchpattern" => draft.search_pattern = Some(value.to_string()),
            "intermediate_pattern" => draft.intermediate_pattern = Some(value.to_string()),
            "baseurl" => draft.base_url = value.to_string(),
            "extra_txt" | "extra_img" => {
                let kind = if keyword == "extra_txt" {
                    PatternKind::Text
                } else {
                    PatternKind::Image
                };
                let (title, regex) = value.split_once('|').ok_or_else(|| {
                    self.error(
                        no,
                        ParseErrorKind::IncompleteExtra(keyword.to_string()),
                        Some(line),
                    )
                })?;
                draft.extras.push(Pattern::new(title, regex, kind));
            }
            _ => {
                return Err(self.error(
                    no,
                    ParseErrorKind::UnknownOption(keyword.to_string()),
                    Some(line),
                ));
            }
        }
        Ok(ParserState::InStrip(draft))
    }

    fn group_line(
        &mut self,
        mut draft: GroupDraft,
        no: usize,
        line: &str,
        keyword: &str,
        value: Option<&str>,
    ) -> Result<ParserState, ConfigError> {
        if value.is_some() {
            return Err(self.error(no, ParseErrorKind::UnknownGroupLine, Some(line)));
        }
        if keyword == "end" {
            debug!(
                "Parsed group \"{}\": {} strips",
                draft.id,
                draft.members.len()
            );
            self.group_ids.insert(draft.id.clone());
            self.groups.push(draft);
            return Ok(ParserState::Outer);
        }
        draft.members.push((keyword.to_lowercase(), no));
        Ok(ParserState::InGroup(draft))
    }

    /// Second pass: every group member must name a parsed strip.
    fn resolve_groups(&self) -> Result<HashMap<String, Group>, ConfigError> {
        debug!("Validating group definitions");
        let mut groups = HashMap::with_capacity(self.groups.len());
        for draft in &self.groups {
            for (strip_id, line) in &draft.members {
                if !self.strips.contains_key(strip_id) {
                    return Err(self.error(
                        *line,
                        ParseErrorKind::UnknownGroupMember {
                            group: draft.id.clone(),
                            strip: strip_id.clone(),
                        },
                        None,
                    ));
                }
            }
            debug!("Group \"{}\" (line {}) resolved", draft.id, draft.line);
            groups.insert(
                draft.id.clone(),
                Group {
                    id: draft.id.clone(),
                    strip_ids: draft.members.iter().map(|(id, _)| id.clone()).collect(),
                },
            );
        }
        Ok(groups)
    }
}

/// Parse definition text into a [`Collection`] stamped with `now`.
///
/// `origin` names the source (usually the file path) in error messages.
pub fn parse(text: &str, origin: &str, now: NaiveDateTime) -> Result<Collection, ConfigError> {
    let mut parser = Parser::new(origin);
    let mut state = ParserState::Outer;
    let mut last_line = 0;

    for (idx, raw) in text.lines().enumerate() {
        let no = idx + 1;
        last_line = no;
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (keyword, value) = split_directive(line);
        state = match state {
            ParserState::Outer => parser.outer_line(no, line, keyword, value)?,
            ParserState::InStrip(draft) => parser.strip_line(draft, no, line, keyword, value)?,
            ParserState::InGroup(draft) => parser.group_line(draft, no, line, keyword, value)?,
        };
    }

    match state {
        ParserState::Outer => {}
        ParserState::InStrip(draft) => {
            return Err(parser.error(last_line, ParseErrorKind::UnclosedStrip(draft.id), None));
        }
        ParserState::InGroup(draft) => {
            return Err(parser.error(last_line, ParseErrorKind::UnclosedGroup(draft.id), None));
        }
    }

    let groups = parser.resolve_groups()?;
    debug!("Finished parsing config file");
    Ok(Collection::new(parser.strips, groups, now))
}

/// Read and parse a definition file.
pub fn load(path: &Path, now: NaiveDateTime) -> Result<Collection, ConfigError> {
    debug!("Opening config filename \"{}\"", path.display());
    let text = fs::read_to_string(path)?;
    parse(&text, &path.display().to_string(), now)
}
