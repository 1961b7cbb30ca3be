//! Daily digest page generation.
//!
//! After the strips have been downloaded, one HTML page per day is written
//! to the output root:
//!
//! ```text
//! output/
//! ├── index.html -> dailystrips-2024.03.09.html
//! ├── dailystrips-2024.03.08.html      # gained a "Next day" link
//! ├── dailystrips-2024.03.09.html
//! ├── dailystrips-style.css
//! └── Garfield/...
//! ```
//!
//! Yesterday's page carries a [`NEXT_DAY_MARKER`] comment where its "Next
//! day" link belongs; it is filled in when today's page is written. The
//! index symlink is replaced through a temporary link and a rename, so
//! `index.html` is never missing.
//!
//! Rendering is behind the [`Renderer`] trait. A render failure does not
//! abort the run: today's page is written with the error message instead.

use crate::download::symlink;
use crate::naming::{self, INDEX_FILENAME};
use crate::pattern::Pattern;
use crate::strip::Strip;
use chrono::NaiveDateTime;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Placeholder in a digest page, replaced by the next day's link.
pub const NEXT_DAY_MARKER: &str = "<!--nextday-->";

/// Stylesheet name that gets a bundled default installed.
pub const DEFAULT_CSS_FILENAME: &str = "dailystrips-style.css";

const DEFAULT_CSS: &str = include_str!("../static/dailystrips-style.css");

const INDEX_TEMP_FILENAME: &str = ".index.html.tmp";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{0}")]
    Template(String),
}

/// Everything a digest template gets to see.
#[derive(Debug)]
pub struct DigestPage<'a> {
    /// `Saturday, March 09, 2024`
    pub human_date: String,
    /// Locale-style full timestamp of the run.
    pub timestamp_full: String,
    /// Filename of yesterday's digest, when it exists.
    pub previous: Option<String>,
    pub strips: Vec<&'a Strip>,
    pub css: Option<&'a str>,
}

impl<'a> DigestPage<'a> {
    pub fn new(now: NaiveDateTime, strips: Vec<&'a Strip>, css: Option<&'a str>) -> Self {
        Self {
            human_date: now.format("%A, %B %d, %Y").to_string(),
            timestamp_full: now.format("%c").to_string(),
            previous: None,
            strips,
            css,
        }
    }
}

pub trait Renderer {
    fn render(&self, page: &DigestPage<'_>) -> Result<String, RenderError>;
}

/// The built-in maud template.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaudRenderer;

impl Renderer for MaudRenderer {
    fn render(&self, page: &DigestPage<'_>) -> Result<String, RenderError> {
        Ok(render_digest(page).into_string())
    }
}

/// Result of writing a day's digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestOutcome {
    /// Today's page.
    pub path: PathBuf,
    /// Yesterday's page, if it existed and was updated.
    pub previous: Option<PathBuf>,
    /// Message written instead of the page when rendering failed.
    pub render_error: Option<String>,
}

pub fn render_digest(page: &DigestPage<'_>) -> Markup {
    let title = format!("Daily Strips for {}", page.human_date);
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @if let Some(css) = page.css {
                    link rel="stylesheet" type="text/css" href=(css);
                }
            }
            body {
                header.digest-header {
                    h1 { (title) }
                    nav.day-nav {
                        @if let Some(prev) = &page.previous {
                            a href=(prev) { "Previous day" }
                        } @else {
                            "Previous day"
                        }
                        (PreEscaped(NEXT_DAY_MARKER))
                    }
                    ul.strip-index {
                        @for strip in &page.strips {
                            li { a href={ "#" (strip.id) } { (strip.name) } }
                        }
                    }
                }
                main {
                    @for strip in &page.strips {
                        (strip_section(strip))
                    }
                }
                footer {
                    "Generated " (page.timestamp_full)
                }
            }
        }
    }
}

fn strip_section(strip: &Strip) -> Markup {
    html! {
        section.strip id=(strip.id) {
            h2 {
                a href=(strip.homepage) { (strip.name) }
                @if let Some(artist) = &strip.artist {
                    " " span.artist { "by " (artist) }
                }
            }
            @if strip.on_hold {
                p.on-hold { "This strip is on hold." }
            }
            @match &strip.error {
                Some(err) => {
                    p.error { (err.to_string()) }
                },
                None => {
                    @if strip.unchanged_since().is_some() {
                        p.unchanged {
                            "Unchanged since "
                            a href=(strip.unchanged_since_link()) { (strip.unchanged_since_human()) }
                        }
                    }
                    @for pattern in &strip.patterns {
                        (pattern_block(pattern))
                    }
                }
            }
        }
    }
}

fn pattern_block(pattern: &Pattern) -> Markup {
    let class = format!("pattern pattern-{}", pattern.id);
    if let Some(err) = &pattern.error {
        return html! {
            div class=(class) { p.error { (pattern.title) ": " (err.to_string()) } }
        };
    }
    if pattern.is_image() {
        let src = pattern.url.clone().or_else(|| pattern.result());
        return html! {
            div class=(class) {
                @if let Some(src) = src {
                    img src=(src) alt=(pattern.title);
                }
            }
        };
    }
    html! {
        div class=(class) {
            @if let Some(text) = pattern.result() {
                p.text { (text) }
            }
        }
    }
}

/// Replace the next-day marker in `content` with a link to `today_filename`.
pub fn splice_next_day(content: &str, today_filename: &str) -> String {
    content.replace(
        NEXT_DAY_MARKER,
        &format!(" | <a href=\"{today_filename}\">Next day</a>"),
    )
}

/// Copy the bundled stylesheet to `dir/css_name`.
///
/// Only happens for [`DEFAULT_CSS_FILENAME`] and only when no such file is
/// there yet. Returns whether a file was written.
pub fn install_stylesheet(dir: &Path, css_name: &str) -> io::Result<bool> {
    let path = dir.join(css_name);
    if css_name != DEFAULT_CSS_FILENAME || path.exists() {
        return Ok(false);
    }
    fs::write(&path, DEFAULT_CSS)?;
    Ok(true)
}

/// Write today's digest into `dir` and point `index.html` at it.
pub fn write_digest(
    dir: &Path,
    now: NaiveDateTime,
    strips: Vec<&Strip>,
    css: Option<&str>,
    renderer: &dyn Renderer,
) -> io::Result<DigestOutcome> {
    let today = now.date();
    let current_name = naming::digest_filename(today);
    let current_path = dir.join(&current_name);

    let mut page = DigestPage::new(now, strips, css);

    let previous_path = today
        .pred_opt()
        .map(|d| dir.join(naming::digest_filename(d)))
        .filter(|p| p.exists());
    if let Some(prev) = &previous_path {
        debug!("Adding next-day link to {}", prev.display());
        let content = fs::read_to_string(prev)?;
        let spliced = splice_next_day(&content, &current_name);
        fs::remove_file(prev)?;
        fs::write(prev, spliced)?;
        page.previous = prev
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
    }

    let (content, render_error) = match renderer.render(&page) {
        Ok(html) => (html, None),
        Err(e) => {
            let message = format!("ERROR: Could not render dailystrips template: {e}");
            warn!("{message}");
            (message.clone(), Some(message))
        }
    };

    if current_path.symlink_metadata().is_ok() {
        fs::remove_file(&current_path)?;
    }
    fs::write(&current_path, content)?;

    swap_index(dir, &current_name)?;

    Ok(DigestOutcome {
        path: current_path,
        previous: previous_path,
        render_error,
    })
}

/// Point `dir/index.html` at `target_name` without a window where it is
/// missing.
pub fn swap_index(dir: &Path, target_name: &str) -> io::Result<()> {
    let temp = dir.join(INDEX_TEMP_FILENAME);
    if temp.symlink_metadata().is_ok() {
        fs::remove_file(&temp)?;
    }
    symlink(Path::new(target_name), &temp)?;
    fs::rename(&temp, dir.join(INDEX_FILENAME))
}
