//! Configuration loading and management
//!
//! Handles parsing of `.sheetsync.toml` configuration files found at the
//! sheet root.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Config file name looked up at the sheet root
pub const CONFIG_FILENAME: &str = ".sheetsync.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Lock configuration
    #[serde(default)]
    pub locks: LockConfig,

    /// Change feed configuration
    #[serde(default)]
    pub feed: FeedConfig,

    /// Sheet layout configuration
    #[serde(default)]
    pub sheet: SheetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: ActorConfig::default(),
            locks: LockConfig::default(),
            feed: FeedConfig::default(),
            sheet: SheetConfig::default(),
        }
    }
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// Lock-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Time-to-live for cell and sheet locks (e.g. "2m", "90s")
    #[serde(default = "default_ttl")]
    pub ttl: String,
}

fn default_ttl() -> String {
    "2m".to_string()
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { ttl: default_ttl() }
    }
}

/// Change feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Maximum number of retained change events
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    5000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Sheet layout configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Per-column default values for newly inserted rows, keyed by
    /// 0-based column index. Absent columns default to the empty string.
    /// When this table is empty the built-in defaults apply.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from `.sheetsync.toml` at the given root.
    ///
    /// Returns defaults when the file is missing; malformed files are an
    /// error rather than silently ignored.
    pub fn load(root: &Path) -> Result<Config> {
        let path = root.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(Config::default());
        }

        let raw = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed lock TTL.
    pub fn lock_ttl(&self) -> Result<Duration> {
        parse_duration(&self.locks.ttl)
    }

    /// Column-default overrides with numeric keys, validated.
    pub fn column_defaults(&self) -> Result<BTreeMap<usize, String>> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.sheet.defaults {
            let col: usize = key.parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "sheet.defaults key '{}' is not a column index",
                    key
                ))
            })?;
            out.insert(col, value.clone());
        }
        Ok(out)
    }

    fn validate(&self) -> Result<()> {
        parse_duration(&self.locks.ttl)?;
        self.column_defaults()?;
        if self.feed.capacity == 0 {
            return Err(Error::InvalidConfig(
                "feed.capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string like "2m", "90s", "1h"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::InvalidArgument(
            "Duration cannot be empty".to_string(),
        ));
    }

    // Find where the number ends and unit begins
    let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
        (&s[..pos], &s[pos..])
    } else {
        // Assume minutes if no unit
        (s, "m")
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid duration number: {}", num_str)))?;

    let duration = match unit.to_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::hours(num),
        "d" | "day" | "days" => Duration::days(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{}'. Expected: s, m, h, d",
                unit
            )));
        }
    };

    Ok(duration)
}
