//! Strip and group definitions and the per-strip fetch/download steps.
//!
//! A [`Strip`] is only ever constructed from a complete definition (see
//! [`crate::parser`]), so its name, homepage, search page and main pattern
//! are always present. Everything the run produces (page errors, intermediate
//! links, pattern results, downloaded paths) is recorded on the strip and its
//! patterns instead of being returned as an error.

use crate::download::DownloadContext;
use crate::fetch::{Fetcher, request_headers};
use crate::intermediate::{self, Intermediate};
use crate::naming;
use crate::pattern::{self, Capture, Pattern};
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Per-strip page-level failures. Any of these suppresses downloading for
/// the strip; other strips are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StripError {
    #[error("ERROR: Unable to retrieve HTML for {name} ({id}) - {url}: {message}")]
    PageFetch {
        name: String,
        id: String,
        url: String,
        message: String,
    },
    #[error("ERROR: Unable to compile intermediate regex: {0}")]
    IntermediateRegex(String),
    #[error("ERROR: Unable to find intermediate URL for {name} ({id})")]
    IntermediateNotFound { name: String, id: String },
    #[error("ERROR: Unable to build intermediate URL for {name} ({id}) from {found}: {message}")]
    IntermediateUrl {
        name: String,
        id: String,
        found: String,
        message: String,
    },
    #[error("ERROR: Unable to retrieve intermediate HTML for {name} ({id}) - {url}: {message}")]
    IntermediateFetch {
        name: String,
        id: String,
        url: String,
        message: String,
    },
    #[error("ERROR: Unable to create directory {path}: {message}")]
    Directory { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct Strip {
    /// Lower-cased lookup key.
    pub id: String,
    pub name: String,
    pub artist: Option<String>,
    pub homepage: String,
    pub search_page: String,
    /// Resolved base URL (the `$homepage` sentinel is already replaced).
    pub base_url: String,
    pub on_hold: bool,
    pub intermediate: Option<Intermediate>,
    /// Index 0 is always the "Main Strip" image pattern.
    pub patterns: Vec<Pattern>,
    pub error: Option<StripError>,
    pub fetch_attempted: bool,
}

impl Strip {
    pub fn main_pattern(&self) -> &Pattern {
        &self.patterns[0]
    }

    /// Earliest "unchanged since" date across the image patterns.
    pub fn unchanged_since(&self) -> Option<NaiveDate> {
        self.patterns
            .iter()
            .filter(|p| p.is_image())
            .filter_map(|p| p.unchanged_since)
            .min()
    }

    /// `Saturday, March 09, 2024` style date, or `n/a`.
    pub fn unchanged_since_human(&self) -> String {
        match self.unchanged_since() {
            Some(d) => d.format("%A, %B %d, %Y").to_string(),
            None => "n/a".to_string(),
        }
    }

    /// Digest page of the day the strip last changed.
    pub fn unchanged_since_link(&self) -> String {
        match self.unchanged_since() {
            Some(d) => naming::digest_filename(d),
            None => naming::INDEX_FILENAME.to_string(),
        }
    }

    /// Fetch the search page (and intermediate page, if any) and run every
    /// pattern against it.
    pub fn fetch_html(&mut self, fetcher: &dyn Fetcher, user_agent: Option<&str>) {
        self.fetch_attempted = true;
        debug!("Fetching HTML page for {} ({})", self.name, self.id);
        debug!("URL is: {}", self.search_page);

        let lines = match self.fetch_page_lines(fetcher, user_agent) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("{e}");
                self.error = Some(e);
                return;
            }
        };

        for pattern in &mut self.patterns {
            debug!(
                "* Searching for \"{}\" pattern: {}",
                pattern.title, pattern.regex
            );
            if pattern.search(lines.as_slice()) {
                debug!("    Found result: {}", pattern.result.as_deref().unwrap_or(""));
                if pattern.is_image() {
                    debug!(
                        "    Full result URL: {}",
                        pattern.result().unwrap_or_default()
                    );
                }
            } else {
                warn!(
                    "ERROR: {} ({}): {}",
                    self.name,
                    self.id,
                    pattern.error_display()
                );
            }
        }
    }

    /// Lines of the page the patterns should run against.
    fn fetch_page_lines(
        &mut self,
        fetcher: &dyn Fetcher,
        user_agent: Option<&str>,
    ) -> Result<Vec<String>, StripError> {
        let headers = request_headers(user_agent, None);
        let page = fetcher
            .get(&self.search_page, &headers)
            .map_err(|e| StripError::PageFetch {
                name: self.name.clone(),
                id: self.id.clone(),
                url: self.search_page.clone(),
                message: e.to_string(),
            })?;
        let lines = split_lines(&page.text());

        let Some(rule) = self.intermediate.as_mut() else {
            debug!("HTML successfully retrieved, starting on matches");
            return Ok(lines);
        };

        debug!("Searching for intermediate pattern: {}", rule.regex);
        let re =
            Regex::new(&rule.regex).map_err(|e| StripError::IntermediateRegex(e.to_string()))?;
        let found = match pattern::find_capture(&re, lines.as_slice()) {
            Capture::Found(found) => found,
            Capture::MissingGroup | Capture::NoMatch => {
                return Err(StripError::IntermediateNotFound {
                    name: self.name.clone(),
                    id: self.id.clone(),
                });
            }
        };
        debug!("Found intermediate link: {found}");
        rule.found = Some(found.clone());

        let url = intermediate::resolve_url(rule.mode, &self.search_page, &found).map_err(|e| {
            StripError::IntermediateUrl {
                name: self.name.clone(),
                id: self.id.clone(),
                found: found.clone(),
                message: e.to_string(),
            }
        })?;
        rule.url = Some(url.clone());

        debug!("Fetching intermediate URL: {url}");
        let page = fetcher
            .get(&url, &headers)
            .map_err(|e| StripError::IntermediateFetch {
                name: self.name.clone(),
                id: self.id.clone(),
                url: url.clone(),
                message: e.to_string(),
            })?;
        debug!("Intermediate HTML successfully retrieved, starting on matches");
        Ok(split_lines(&page.text()))
    }

    /// Download every image pattern into `<root>/<strip name>/`.
    pub fn download(
        &mut self,
        fetcher: &dyn Fetcher,
        root: &Path,
        today: NaiveDate,
        user_agent: Option<&str>,
    ) {
        let dir = root.join(&self.name);
        if !dir.exists() {
            debug!("Creating directory: {}", dir.display());
            if let Err(e) = fs::create_dir(&dir) {
                let err = StripError::Directory {
                    path: dir.display().to_string(),
                    message: e.to_string(),
                };
                warn!("{err}");
                self.error = Some(err);
                return;
            }
        }

        let ctx = DownloadContext {
            fetcher,
            dir: &dir,
            link_dir: &self.name,
            today,
            referer: Some(&self.search_page),
            user_agent,
        };
        for pattern in &mut self.patterns {
            pattern.download_to(&ctx);
            if let Some(e) = &pattern.error {
                warn!("ERROR: {} ({}): [{}]", self.name, self.id, e);
            }
        }
    }
}

/// Split page text into lines. Every Unicode line boundary counts, a lone
/// `\r` included, and `\r\n` is one break.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(is_line_break) {
        lines.push(rest[..pos].to_string());
        let skip = if rest[pos..].starts_with("\r\n") {
            2
        } else {
            rest[pos..].chars().next().map_or(1, char::len_utf8)
        };
        rest = &rest[pos + skip..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// A named, ordered list of strip ids. Every id is known to exist in the
/// collection the group came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub strip_ids: Vec<String>,
}
