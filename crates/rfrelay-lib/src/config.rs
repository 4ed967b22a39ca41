//! User configuration: TOML file under the platform config directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matcher::{MatchPattern, ScanOptions, WILDCARD};
use crate::protocol::USB_TIMEOUT_MS;
use crate::relay::Backend;

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# rfrelay configuration. Command-line flags override these values.\n\n";

/// Upper bound accepted for `timeout_ms`.
pub const MAX_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial number suffix to match. Default: `"*"` (any).
    #[serde(default = "default_wildcard")]
    pub serial: String,

    /// Model substring to match. Default: `"*"` (any).
    #[serde(default = "default_wildcard")]
    pub model: String,

    /// Relay backend: `"mc"` / `"minicircuits"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Per-transfer USB timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Prefix for log lines and switch names.
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_wildcard() -> String {
    WILDCARD.into()
}
fn default_backend() -> String {
    "mc".into()
}
fn default_timeout_ms() -> u64 {
    USB_TIMEOUT_MS
}
fn default_name() -> String {
    "relay".into()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            serial: default_wildcard(),
            model: default_wildcard(),
            backend: default_backend(),
            timeout_ms: default_timeout_ms(),
            name: default_name(),
        }
    }
}

/// Problems reported by [`Config::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `field` is empty; use `"*"` to match anything.
    EmptyPattern { field: &'static str },
    /// `timeout_ms` is 0 or above [`MAX_TIMEOUT_MS`].
    InvalidTimeout(u64),
    UnknownBackend(String),
    EmptyName,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyPattern { field } => {
                write!(f, "{field} cannot be empty (use \"*\" to match any)")
            }
            ValidationError::InvalidTimeout(ms) => {
                write!(f, "Invalid timeout_ms: {ms} (expected 1..={MAX_TIMEOUT_MS})")
            }
            ValidationError::UnknownBackend(b) => write!(f, "Unknown backend: {b:?}"),
            ValidationError::EmptyName => write!(f, "name cannot be empty"),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rfrelay"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Load config from an arbitrary path.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist and
    /// `(defaults, [warning])` if it can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Save config atomically (write to temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Save config to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.serial.trim().is_empty() {
            errors.push(ValidationError::EmptyPattern { field: "serial" });
        }
        if self.model.trim().is_empty() {
            errors.push(ValidationError::EmptyPattern { field: "model" });
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            errors.push(ValidationError::InvalidTimeout(self.timeout_ms));
        }
        if Backend::parse(&self.backend).is_err() {
            errors.push(ValidationError::UnknownBackend(self.backend.clone()));
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn pattern(&self) -> MatchPattern {
        MatchPattern::new(self.serial.trim(), self.model.trim())
    }

    /// Vendor/product ids for the configured backend plus the timeout.
    pub fn scan_options(&self) -> Result<ScanOptions> {
        Ok(Backend::parse(&self.backend)?.scan_options(self.timeout()))
    }
}
