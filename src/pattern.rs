//! Regex extraction rules applied to fetched page text.
//!
//! A [`Pattern`] holds one regular expression with a named capture group
//! `result`. The expression is compiled only when [`Pattern::search`] runs, so
//! strips that are never requested never pay for (or fail on) their regexes.
//!
//! Matching and decoding are split on purpose: [`Pattern::search`] stores the
//! raw captured text, and [`Pattern::result`] applies HTML entity decoding and
//! the base URL at read time. The raw match stays available for diagnostics.

use crate::naming;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Name of the capture group every pattern must define.
pub const RESULT_GROUP: &str = "result";

/// Title of the mandatory first pattern of every strip.
pub const MAIN_STRIP_TITLE: &str = "Main Strip";

/// Per-pattern failures. Stored on the pattern, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Error parsing regex: {0}")]
    Regex(String),
    #[error("Could not find \"{title}\" pattern in HTML")]
    NotFound { title: String },
    #[error("Pattern \"{title}\" has no \"result\" group in its match")]
    NoResultGroup { title: String },
    #[error("ERROR: Received HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("ERROR: Unable to retrieve \"{title}\" image: {message}")]
    Transport { title: String, message: String },
    #[error("ERROR: Unable to determine \"{title}\" image type: {message}")]
    UnknownImageType { title: String, message: String },
    #[error("ERROR: Unable to save {title} image: {message}")]
    Save { title: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Image,
    Text,
}

impl PatternKind {
    pub fn label(self) -> &'static str {
        match self {
            PatternKind::Image => "Image",
            PatternKind::Text => "Text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub title: String,
    /// Filesystem/CSS-safe token derived from `title`.
    pub id: String,
    pub regex: String,
    pub kind: PatternKind,
    /// Prefix for image results. Set when the owning strip is finalized.
    pub base_url: String,
    /// Raw text of the `result` capture group.
    pub result: Option<String>,
    pub error: Option<PatternError>,
    /// Public path `<strip dir>/<filename>` once downloaded.
    pub url: Option<String>,
    /// Local path of today's file once downloaded.
    pub file_path: Option<PathBuf>,
    pub unchanged_since: Option<NaiveDate>,
}

impl Pattern {
    pub fn new(title: impl Into<String>, regex: impl Into<String>, kind: PatternKind) -> Self {
        let title = title.into();
        Self {
            id: naming::pattern_id(&title),
            title,
            regex: regex.into(),
            kind,
            base_url: String::new(),
            result: None,
            error: None,
            url: None,
            file_path: None,
            unchanged_since: None,
        }
    }

    pub fn image(title: impl Into<String>, regex: impl Into<String>) -> Self {
        Self::new(title, regex, PatternKind::Image)
    }

    pub fn text(title: impl Into<String>, regex: impl Into<String>) -> Self {
        Self::new(title, regex, PatternKind::Text)
    }

    pub fn is_image(&self) -> bool {
        self.kind == PatternKind::Image
    }

    /// Search `lines` in order and capture `result` from the first matching line.
    ///
    /// Returns whether a result was stored. On failure the reason is recorded
    /// in `error` instead; nothing is raised.
    pub fn search<S: AsRef<str>>(&mut self, lines: &[S]) -> bool {
        let re = match Regex::new(&self.regex) {
            Ok(re) => re,
            Err(e) => {
                self.set_error(PatternError::Regex(e.to_string()));
                return false;
            }
        };
        match find_capture(&re, lines) {
            Capture::Found(value) => {
                self.result = Some(value);
                self.error = None;
                true
            }
            Capture::MissingGroup => {
                self.set_error(PatternError::NoResultGroup {
                    title: self.title.clone(),
                });
                false
            }
            Capture::NoMatch => {
                self.set_error(PatternError::NotFound {
                    title: self.title.clone(),
                });
                false
            }
        }
    }

    /// Decoded result: entity-unescaped, and prefixed with `base_url` for
    /// image patterns. `None` until a search succeeded.
    pub fn result(&self) -> Option<String> {
        let raw = self.result.as_deref()?;
        let decoded = decode_entities(raw);
        Some(match self.kind {
            PatternKind::Image => format!("{}{}", self.base_url, decoded),
            PatternKind::Text => decoded.into_owned(),
        })
    }

    /// Bracketed error text for listings, e.g. `[Error parsing regex: ...]`.
    pub fn error_display(&self) -> String {
        match &self.error {
            Some(e) => format!("[{e}]"),
            None => "[None]".to_string(),
        }
    }

    /// Record an error, clearing any stale result so the two never coexist.
    pub(crate) fn set_error(&mut self, error: PatternError) {
        self.result = None;
        self.error = Some(error);
    }
}

pub(crate) enum Capture {
    Found(String),
    MissingGroup,
    NoMatch,
}

/// Scan lines in order for the first match of `re`, taking group `result`.
pub(crate) fn find_capture<S: AsRef<str>>(re: &Regex, lines: &[S]) -> Capture {
    for line in lines {
        if let Some(caps) = re.captures(line.as_ref()) {
            return match caps.name(RESULT_GROUP) {
                Some(m) => Capture::Found(m.as_str().to_string()),
                None => Capture::MissingGroup,
            };
        }
    }
    Capture::NoMatch
}

/// Named references that HTML also accepts without the closing `;`.
const LEGACY_ENTITIES: &[&str] = &[
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig",
    "agrave", "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy",
    "curren", "deg", "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14",
    "frac34", "gt", "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt",
    "macr", "micro", "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf",
    "ordm", "oslash", "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg",
    "sect", "shy", "sup1", "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc",
    "ugrave", "uml", "uuml", "yacute", "yen", "yuml",
];

fn entity_regex() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| {
        Regex::new(r"&(#[0-9]+;?|#[xX][0-9a-fA-F]+;?|[A-Za-z][A-Za-z0-9]{0,31};?)")
            .expect("entity regex is valid")
    })
}

/// Decode character references the way an HTML5 parser does in text.
///
/// Legacy names decode without a semicolon (`&amp b`, `&copyright`), numeric
/// references may omit it too, and unknown names are left as written.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    entity_regex().replace_all(raw, |caps: &Captures<'_>| decode_reference(&caps[1]))
}

fn decode_reference(body: &str) -> String {
    let name = body.strip_suffix(';').unwrap_or(body);
    if let Some(digits) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return numeric_reference(u32::from_str_radix(digits, 16).ok());
    }
    if let Some(digits) = name.strip_prefix('#') {
        return numeric_reference(digits.parse().ok());
    }

    if body.ends_with(';') {
        let full = format!("&{body}");
        let decoded = html_escape::decode_html_entities(&full);
        if decoded.as_ref() != full.as_str() {
            return decoded.into_owned();
        }
    } else if LEGACY_ENTITIES.contains(&name) {
        return html_escape::decode_html_entities(&format!("&{name};")).into_owned();
    }

    // Longest legacy prefix wins: `&copyright` is `©right`.
    for end in (1..name.len()).rev() {
        let prefix = &name[..end];
        if LEGACY_ENTITIES.contains(&prefix) {
            let entity = format!("&{prefix};");
            let decoded = html_escape::decode_html_entities(&entity);
            return format!("{decoded}{}", &body[end..]);
        }
    }
    format!("&{body}")
}

/// Code point of a numeric reference, with the HTML5 replacements for
/// windows-1252 controls, surrogates and out-of-range values.
fn numeric_reference(code: Option<u32>) -> String {
    const REPLACEMENT: &str = "\u{fffd}";
    let Some(code) = code else {
        return REPLACEMENT.to_string();
    };
    let mapped = match code {
        0x00 => Some('\u{fffd}'),
        0x0d => Some('\r'),
        0x80 => Some('\u{20ac}'),
        0x82 => Some('\u{201a}'),
        0x83 => Some('\u{0192}'),
        0x84 => Some('\u{201e}'),
        0x85 => Some('\u{2026}'),
        0x86 => Some('\u{2020}'),
        0x87 => Some('\u{2021}'),
        0x88 => Some('\u{02c6}'),
        0x89 => Some('\u{2030}'),
        0x8a => Some('\u{0160}'),
        0x8b => Some('\u{2039}'),
        0x8c => Some('\u{0152}'),
        0x8e => Some('\u{017d}'),
        0x91 => Some('\u{2018}'),
        0x92 => Some('\u{2019}'),
        0x93 => Some('\u{201c}'),
        0x94 => Some('\u{201d}'),
        0x95 => Some('\u{2022}'),
        0x96 => Some('\u{2013}'),
        0x97 => Some('\u{2014}'),
        0x98 => Some('\u{02dc}'),
        0x99 => Some('\u{2122}'),
        0x9a => Some('\u{0161}'),
        0x9b => Some('\u{203a}'),
        0x9c => Some('\u{0153}'),
        0x9e => Some('\u{017e}'),
        0x9f => Some('\u{0178}'),
        0x81 | 0x8d | 0x8f | 0x90 | 0x9d => char::from_u32(code),
        _ => None,
    };
    if let Some(c) = mapped {
        return c.to_string();
    }
    let Some(c) = char::from_u32(code) else {
        return REPLACEMENT.to_string();
    };
    let noncharacter = (0xfdd0..=0xfdef).contains(&code) || code & 0xfffe == 0xfffe;
    let control = matches!(code, 0x01..=0x08 | 0x0b | 0x0e..=0x1f | 0x7f..=0x9f);
    if noncharacter || control {
        String::new()
    } else {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XKCD_REGEX: &str = r#"<img src="(?P<result>[^"]+\.png)""#;

    #[test]
    fn new_derives_id_from_title() {
        let p = Pattern::image("Main Strip", "x");
        assert_eq!(p.id, "main_strip");
    }

    #[test]
    fn search_captures_result_group() {
        let mut p = Pattern::image(MAIN_STRIP_TITLE, XKCD_REGEX);
        p.base_url = "https://xkcd.com".into();
        assert!(p.search(&["<html>", r#"<img src="/comic.png">"#]));
        assert_eq!(p.result.as_deref(), Some("/comic.png"));
        assert_eq!(p.result().as_deref(), Some("https://xkcd.com/comic.png"));
        assert!(p.error.is_none());
    }

    #[test]
    fn search_returns_first_matching_line() {
        let mut p = Pattern::image("Main Strip", XKCD_REGEX);
        p.search(&[r#"<img src="/a.png">"#, r#"<img src="/b.png">"#]);
        assert_eq!(p.result.as_deref(), Some("/a.png"));
    }

    #[test]
    fn search_not_found_sets_error() {
        let mut p = Pattern::image("Main Strip", XKCD_REGEX);
        assert!(!p.search(&["nothing here"]));
        assert!(p.result.is_none());
        assert_eq!(
            p.error,
            Some(PatternError::NotFound {
                title: "Main Strip".into()
            })
        );
        assert_eq!(
            p.error_display(),
            "[Could not find \"Main Strip\" pattern in HTML]"
        );
    }

    #[test]
    fn bad_regex_records_compile_error() {
        let mut p = Pattern::text("Title", "(?P<result>[unclosed");
        assert!(!p.search(&["anything"]));
        match &p.error {
            Some(PatternError::Regex(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected regex error, got {other:?}"),
        }
        assert!(p.error_display().starts_with("[Error parsing regex:"));
    }

    #[test]
    fn regex_without_result_group_is_error() {
        let mut p = Pattern::text("Title", "title=\"([^\"]*)\"");
        assert!(!p.search(&[r#"<img title="hi">"#]));
        assert!(matches!(p.error, Some(PatternError::NoResultGroup { .. })));
    }

    #[test]
    fn text_result_is_decoded_without_base_url() {
        let mut p = Pattern::text("Title", r#"title="(?P<result>[^"]*)""#);
        p.base_url = "https://ignored.test".into();
        p.search(&[r#"<img title="Tom &amp; Jerry&#39;s">"#]);
        assert_eq!(p.result.as_deref(), Some("Tom &amp; Jerry&#39;s"));
        assert_eq!(p.result().as_deref(), Some("Tom & Jerry's"));
    }

    #[test]
    fn entities_without_semicolons_are_decoded() {
        assert_eq!(
            decode_entities("a &amp b &copy c &#39; d &hellip; e"),
            "a & b \u{a9} c ' d \u{2026} e"
        );
        assert_eq!(decode_entities("&copyright &#39 &#x41"), "\u{a9}right ' A");
        assert_eq!(decode_entities("&ampfoo; &AMP;"), "&foo; &");
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(decode_entities("&bogus; &hellip &"), "&bogus; &hellip &");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn numeric_references_follow_html_rules() {
        assert_eq!(decode_entities("&#128;&#x97;"), "\u{20ac}\u{2014}");
        assert_eq!(decode_entities("&#0;&#xD800;&#99999999999;"), "\u{fffd}\u{fffd}\u{fffd}");
        assert_eq!(decode_entities("a&#1;b&#xFFFF;c"), "abc");
    }

    #[test]
    fn image_result_is_decoded_then_prefixed() {
        let mut p = Pattern::image("Main Strip", r#"src="(?P<result>[^"]*)""#);
        p.base_url = "https://c.test".into();
        p.search(&[r#"<img src="/get?a=1&amp;b=2&ampc=3">"#]);
        assert_eq!(
            p.result().as_deref(),
            Some("https://c.test/get?a=1&b=2&c=3")
        );
    }

    #[test]
    fn result_is_none_before_search() {
        let p = Pattern::image("Main Strip", XKCD_REGEX);
        assert_eq!(p.result(), None);
    }

    #[test]
    fn set_error_clears_result() {
        let mut p = Pattern::image("Main Strip", XKCD_REGEX);
        p.search(&[r#"<img src="/a.png">"#]);
        p.set_error(PatternError::Http {
            status: 404,
            reason: "Not Found".into(),
        });
        assert!(p.result.is_none());
        assert!(p.error.is_some());
    }
}
