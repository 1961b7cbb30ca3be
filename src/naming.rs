//! Centralized filename handling for the dated snapshot convention.
//!
//! Every downloaded image is stored as `YYYY-MM-DD-<pattern id>.<ext>` inside
//! its strip's directory, and every digest page as
//! `dailystrips-YYYY.MM.DD.html` in the output root. Both the dedup logic and
//! the digest linkage depend on these names being reproducible from a date
//! alone, so building and parsing them lives in one place.
//!
//! ## Pattern ids
//!
//! Pattern titles are free text (`Main Strip`, `Bonus Panel`). The id used in
//! filenames and CSS classes lower-cases the title and replaces everything
//! outside `[0-9a-z]` with `_`:
//! - `Main Strip` → `main_strip`
//! - `Hover-Text!` → `hover_text_`

use chrono::{Datelike, NaiveDate};

/// Prefix shared by all generated digest pages.
pub const DIGEST_PREFIX: &str = "dailystrips-";

/// Name of the link that always points at the latest digest page.
pub const INDEX_FILENAME: &str = "index.html";

/// Normalize a pattern title into a filesystem- and CSS-safe token.
///
/// Deterministic, so the same title maps to the same filename every day.
pub fn pattern_id(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_digit() || c.is_ascii_lowercase() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build `YYYY-MM-DD-<id>.<ext>` with zero-padded date fields.
pub fn dated_filename(date: NaiveDate, id: &str, ext: &str) -> String {
    format!(
        "{:04}-{:02}-{:02}-{}.{}",
        date.year(),
        date.month(),
        date.day(),
        id,
        ext
    )
}

/// Extract the date embedded in a `YYYY-MM-DD-...` filename.
///
/// Returns `None` when the first three dash-separated fields are not a valid
/// calendar date. Only the date prefix is inspected; whatever follows the
/// third dash is ignored.
pub fn parse_dated_filename(name: &str) -> Option<NaiveDate> {
    let mut parts = name.splitn(4, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Digest page filename for the given day, e.g. `dailystrips-2024.03.09.html`.
pub fn digest_filename(date: NaiveDate) -> String {
    format!(
        "{}{:04}.{:02}.{:02}.html",
        DIGEST_PREFIX,
        date.year(),
        date.month(),
        date.day()
    )
}
