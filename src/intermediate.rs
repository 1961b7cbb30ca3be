//! Second-hop URL resolution for strips whose image lives behind a listing
//! or redirect page.
//!
//! When a strip declares an `intermediate_pattern`, its search page is only
//! used to find a link; the page behind that link is what the strip's
//! patterns run against. How the found link is turned into a URL depends on
//! the strip's [`IntermediateMode`].

use url::{Position, Url};

/// How a captured intermediate link becomes a fetchable URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntermediateMode {
    /// The captured value is already a full URL.
    #[default]
    AbsoluteUrl,
    /// Search page URL + captured value, concatenated verbatim.
    RelativeToSearchPage,
    /// Scheme and host of the search page + captured value as the path.
    NeedsHostnameFromSearchPage,
}

impl IntermediateMode {
    /// Human description used in strip listings.
    pub fn describe(self) -> &'static str {
        match self {
            IntermediateMode::AbsoluteUrl => "full URL",
            IntermediateMode::RelativeToSearchPage => "relative link",
            IntermediateMode::NeedsHostnameFromSearchPage => "needs hostname",
        }
    }
}

/// A strip's intermediate rule plus what it produced on the last fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intermediate {
    pub regex: String,
    pub mode: IntermediateMode,
    /// Raw value captured from the search page.
    pub found: Option<String>,
    /// URL actually fetched as the second page.
    pub url: Option<String>,
}

impl Intermediate {
    pub fn new(regex: impl Into<String>, mode: IntermediateMode) -> Self {
        Self {
            regex: regex.into(),
            mode,
            found: None,
            url: None,
        }
    }
}

/// Combine a captured link with the search page URL according to `mode`.
///
/// Only [`IntermediateMode::NeedsHostnameFromSearchPage`] has to parse the
/// search page; it fails when that URL has no host.
pub fn resolve_url(
    mode: IntermediateMode,
    search_page: &str,
    found: &str,
) -> Result<String, url::ParseError> {
    match mode {
        IntermediateMode::AbsoluteUrl => Ok(found.to_string()),
        IntermediateMode::RelativeToSearchPage => Ok(format!("{search_page}{found}")),
        IntermediateMode::NeedsHostnameFromSearchPage => {
            let parsed = Url::parse(search_page)?;
            if !parsed.has_host() {
                return Err(url::ParseError::EmptyHost);
            }
            Ok(format!("{}{}", &parsed[..Position::BeforePath], found))
        }
    }
}
