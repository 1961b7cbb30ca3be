//! Runtime settings.
//!
//! Strip definitions live in their own file (see [`crate::parser`]). This
//! module covers the handful of knobs that change how a run talks to the
//! network and where it finds things, read from an optional
//! `dailystrips.toml`:
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! strips_file = "strips.def"          # Strip definition file
//! user_agent = "Mozilla/5.0 ..."      # Sent with every request; "" sends none
//! css = "dailystrips-style.css"       # Stylesheet linked from digests; "" links none
//! # ca_certs = "/etc/ssl/extra.pem"   # PEM bundle to trust instead of the built-in roots
//! ```
//!
//! Unknown keys are rejected to catch typos early. Command-line flags win
//! over anything in the file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SETTINGS_FILENAME: &str = "dailystrips.toml";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Path to the strip definition file.
    pub strips_file: PathBuf,
    /// User-Agent header value. Empty means no header.
    pub user_agent: String,
    /// Stylesheet filename, relative to the download directory. Empty means
    /// the digest links no stylesheet.
    pub css: String,
    /// PEM certificate bundle trusted instead of the built-in roots.
    pub ca_certs: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strips_file: PathBuf::from("strips.def"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            css: crate::digest::DEFAULT_CSS_FILENAME.to_string(),
            ca_certs: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.strips_file.as_os_str().is_empty() {
            return Err(SettingsError::Validation(
                "strips_file must not be empty".into(),
            ));
        }
        if self.css.contains('/') || self.css.contains('\\') {
            return Err(SettingsError::Validation(
                "css must be a bare filename inside the download directory".into(),
            ));
        }
        Ok(())
    }

    pub fn user_agent(&self) -> Option<&str> {
        Some(self.user_agent.as_str()).filter(|ua| !ua.is_empty())
    }

    pub fn css(&self) -> Option<&str> {
        Some(self.css.as_str()).filter(|css| !css.is_empty())
    }
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(text: &str) -> Result<Settings, SettingsError> {
    let settings: Settings = toml::from_str(text)?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`.
///
/// A missing file yields the stock defaults; a file that exists but does not
/// parse or validate is an error.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path)?;
    parse_settings(&content)
}

/// A fully commented stock `dailystrips.toml`, printed by `--gen-settings`.
pub fn stock_settings_toml() -> &'static str {
    r##"# dailystrips settings
# ====================
# All settings are optional. Values shown below are the defaults.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# Strip definition file (same as --config).
strips_file = "strips.def"

# User-Agent sent with every page and image request (same as --useragent).
# Set to "" to send no User-Agent header at all.
user_agent = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"

# Stylesheet linked from each digest page (same as --css). The default name
# gets a bundled stylesheet installed next to the digests on first use.
# Set to "" to link no stylesheet.
css = "dailystrips-style.css"

# PEM bundle of CA certificates to trust instead of the built-in roots
# (same as --ca-certs).
# ca_certs = "/etc/ssl/certs/extra.pem"
"##
}
