//! Workspace configuration: the prefix character, numeric base, and zero-pad widths that
//! parameterize every other layer of the bank grammar.
//!
//! Configuration is a plain value, never a global: callers load it once and pass it by
//! reference into the grammar, resolver, store, and kernel. There is no lazily-initialized
//! singleton here.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use cellbank_numeral::normalize_base;
use serde::Deserialize;
use serde::Serialize;

/// Default prefix character marking a bank identifier in text.
pub const DEFAULT_PREFIX: char = 'x';
/// Default numeric base for all tokens in the grammar.
pub const DEFAULT_BASE: u32 = 10;
/// Default zero-pad width for bank ids.
pub const DEFAULT_WIDTH_BANK: usize = 5;
/// Default zero-pad width for register ids.
pub const DEFAULT_WIDTH_REG: usize = 2;
/// Default zero-pad width for address ids.
pub const DEFAULT_WIDTH_ADDR: usize = 4;

/// The workspace configuration, as persisted to `files/config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The single character that marks a bank identifier in text.
    pub prefix: char,
    /// The positional base used for every numeric token.
    pub base: u32,
    /// Zero-pad width for bank ids.
    pub width_bank: usize,
    /// Zero-pad width for register ids.
    pub width_reg: usize,
    /// Zero-pad width for address ids.
    pub width_addr: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX,
            base: DEFAULT_BASE,
            width_bank: DEFAULT_WIDTH_BANK,
            width_reg: DEFAULT_WIDTH_REG,
            width_addr: DEFAULT_WIDTH_ADDR,
        }
    }
}

/// On-disk representation of [`Config`].
///
/// Every field is optional so that a hand-edited or partial `config.json` still loads: any
/// missing key falls back to its default, and `prefix` takes only the first character of
/// whatever string is supplied.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    base: Option<u32>,
    #[serde(default, rename = "widthBank")]
    width_bank: Option<usize>,
    #[serde(default, rename = "widthReg")]
    width_reg: Option<usize>,
    #[serde(default, rename = "widthAddr")]
    width_addr: Option<usize>,
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let defaults = Config::default();

        Config {
            prefix: raw.prefix.and_then(|s| s.chars().next()).unwrap_or(defaults.prefix),
            base: normalize_base(raw.base.unwrap_or(defaults.base)),
            width_bank: raw.width_bank.unwrap_or(defaults.width_bank),
            width_reg: raw.width_reg.unwrap_or(defaults.width_reg),
            width_addr: raw.width_addr.unwrap_or(defaults.width_addr),
        }
    }
}

impl From<Config> for RawConfig {
    fn from(config: Config) -> Self {
        RawConfig {
            prefix: Some(config.prefix.to_string()),
            base: Some(config.base),
            width_bank: Some(config.width_bank),
            width_reg: Some(config.width_reg),
            width_addr: Some(config.width_addr),
        }
    }
}

/// Errors raised while loading or saving a [`Config`].
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing `config.json` failed at the filesystem layer.
    Io(io::Error),
    /// The file exists but is not valid JSON.
    Malformed(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "configuration I/O error: {error}"),
            Self::Malformed(error) => write!(f, "configuration is not valid JSON: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Malformed(error) => Some(error),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        Self::Malformed(error)
    }
}

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// If `path` does not exist, the defaults are written to it (when possible) and
    /// returned; a failure to write is not fatal, since the in-memory defaults are still
    /// usable. If `path` exists, it is parsed leniently: missing keys fall back to their
    /// defaults and an invalid `base` collapses to 10.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        match fs::read(path) {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), "loading configuration");

                let raw: RawConfig = serde_json::from_slice(&bytes)?;
                Ok(Config::from(raw))
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no configuration found, writing defaults");

                let config = Config::default();
                if let Err(error) = config.save(path) {
                    tracing::warn!(path = %path.display(), %error, "failed to persist default configuration");
                }
                Ok(config)
            }
            Err(error) => Err(ConfigError::Io(error)),
        }
    }

    /// Serializes this configuration to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw = RawConfig::from(*self);
        let json = serde_json::to_vec_pretty(&raw)?;
        fs::write(path, json)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn load_is_lenient_about_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"base": 16}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base, 16);
        assert_eq!(config.prefix, DEFAULT_PREFIX);
        assert_eq!(config.width_bank, DEFAULT_WIDTH_BANK);
    }

    #[test]
    fn prefix_takes_first_character_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"prefix": "zebra"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.prefix, 'z');
    }

    #[test]
    fn invalid_base_collapses_to_ten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"base": 99}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base, 10);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config { prefix: 'q', base: 16, width_bank: 6, width_reg: 3, width_addr: 5 };
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
