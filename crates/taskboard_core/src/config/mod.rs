//! User configuration: theme, command aliases and the tunables the session
//! reads at startup. Stored as JSON next to the data directory.

use crate::auth::DEFAULT_SESSION_TTL_HOURS;
use crate::error::AppError;
use crate::storage::DEFAULT_QUOTA_BYTES;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const TASKBOARD_CONFIG_PATH: &str = "TASKBOARD_CONFIG_PATH";
pub const DEFAULT_SNOOZE_MINUTES: u32 = 10;

const APP_DIR: &str = "taskboard";
const CONFIG_FILE: &str = "config.json";

/// ANSI escape pair used to tint CLI output. Empty codes mean plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
}

const RESET: &str = "\x1b[0m";

impl Palette {
    pub const fn plain() -> Self {
        Palette {
            accent: "",
            muted: "",
        }
    }

    pub fn accentize(&self, text: &str) -> String {
        paint(self.accent, text)
    }

    pub fn mutedize(&self, text: &str) -> String {
        paint(self.muted, text)
    }
}

fn paint(code: &str, text: &str) -> String {
    if code.is_empty() {
        text.to_string()
    } else {
        format!("{code}{text}{RESET}")
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Theme {
    #[default]
    Default,
    Noir,
    Solarized,
}

impl Theme {
    /// Lenient lookup: case, spacing and punctuation are ignored, `light` and
    /// `dark` are accepted, anything unknown is the default theme.
    pub fn parse(raw: &str) -> Theme {
        let key: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "noir" | "dark" | "darkmode" => Theme::Noir,
            "solarized" => Theme::Solarized,
            _ => Theme::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Noir => "noir",
            Theme::Solarized => "solarized",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Default => Palette::plain(),
            Theme::Noir => Palette {
                accent: "\x1b[38;5;208m",
                muted: "\x1b[38;5;250m",
            },
            Theme::Solarized => Palette {
                accent: "\x1b[38;5;37m",
                muted: "\x1b[38;5;246m",
            },
        }
    }
}

impl From<String> for Theme {
    fn from(raw: String) -> Self {
        Theme::parse(&raw)
    }
}

impl From<Theme> for String {
    fn from(theme: Theme) -> Self {
        theme.as_str().to_string()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    pub aliases: HashMap<String, String>,
    pub snooze_minutes: Option<u32>,
    pub session_ttl_hours: Option<u32>,
    pub storage_quota_bytes: Option<usize>,
}

impl Config {
    pub fn snooze_minutes(&self) -> u32 {
        positive_or(self.snooze_minutes, DEFAULT_SNOOZE_MINUTES)
    }

    pub fn session_ttl_hours(&self) -> u32 {
        positive_or(self.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS)
    }

    pub fn storage_quota_bytes(&self) -> usize {
        positive_or(self.storage_quota_bytes, DEFAULT_QUOTA_BYTES)
    }

    /// Expands a leading alias into its command words.
    pub fn expand_alias(&self, args: Vec<String>) -> Vec<String> {
        let Some(expansion) = args.first().and_then(|first| self.aliases.get(first)) else {
            return args;
        };
        expansion
            .split_whitespace()
            .map(str::to_string)
            .chain(args.into_iter().skip(1))
            .collect()
    }

    /// Applies command-line overrides on top of the file values.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Config {
        let mut merged = self.clone();
        if let Some(theme) = overrides.theme.as_deref() {
            merged.theme = Theme::parse(theme);
        }
        merged.aliases.extend(
            overrides
                .aliases
                .iter()
                .map(|(name, expansion)| (name.clone(), expansion.clone())),
        );
        merged.snooze_minutes = overrides.snooze_minutes.or(merged.snooze_minutes);
        merged.session_ttl_hours = overrides.session_ttl_hours.or(merged.session_ttl_hours);
        merged
    }
}

fn positive_or<T: Copy + Default + PartialOrd>(value: Option<T>, fallback: T) -> T {
    value.filter(|value| *value > T::default()).unwrap_or(fallback)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub aliases: HashMap<String, String>,
    pub snooze_minutes: Option<u32>,
    pub session_ttl_hours: Option<u32>,
}

/// Result of reading the config file. A broken file still yields a usable
/// config; the problem is surfaced through `warning`.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub warning: Option<AppError>,
}

impl LoadedConfig {
    fn defaults(warning: Option<AppError>) -> Self {
        LoadedConfig {
            config: Config::default(),
            warning,
        }
    }
}

/// Per-user base directory (`~/.config/taskboard` or `%APPDATA%\taskboard`).
pub fn app_dir() -> Result<PathBuf, AppError> {
    let (var, nested) = if cfg!(windows) {
        ("APPDATA", None)
    } else {
        ("HOME", Some(".config"))
    };
    let base = std::env::var(var).map_err(|_| AppError::invalid_data(format!("{var} is not set")))?;
    let mut dir = PathBuf::from(base);
    if let Some(nested) = nested {
        dir.push(nested);
    }
    dir.push(APP_DIR);
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf, AppError> {
    match std::env::var(TASKBOARD_CONFIG_PATH) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(app_dir()?.join(CONFIG_FILE)),
    }
}

pub fn load_config() -> LoadedConfig {
    match config_path() {
        Ok(path) => load_config_at(&path),
        Err(err) => LoadedConfig::defaults(Some(err)),
    }
}

fn load_config_at(path: &Path) -> LoadedConfig {
    if !path.exists() {
        return LoadedConfig::defaults(None);
    }
    match read_config(path) {
        Ok(config) => LoadedConfig {
            config,
            warning: None,
        },
        Err(err) => LoadedConfig::defaults(Some(err)),
    }
}

fn read_config(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content)
        .map_err(|err| AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err)))
}
