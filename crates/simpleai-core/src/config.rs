//! Client configuration.
//!
//! Defaults match the hosted endpoints. `Config::from_env` overlays the
//! `SIMPLEAI_*` environment variables; front ends may overlay their own
//! flags on top.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.prototyped.ai";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(7);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const API_BASE_VAR: &str = "SIMPLEAI_API_BASE";
pub const HISTORY_WINDOW_VAR: &str = "SIMPLEAI_HISTORY_WINDOW";
pub const DEBOUNCE_MS_VAR: &str = "SIMPLEAI_DEBOUNCE_MS";
pub const TIMEOUT_SECS_VAR: &str = "SIMPLEAI_TIMEOUT_SECS";
pub const TRANSCRIPT_DIR_VAR: &str = "SIMPLEAI_TRANSCRIPT_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL for the `/text`, `/image` and `/interrogate` endpoints.
    pub api_base: String,
    /// How many recent turns are replayed into each dispatch prompt.
    pub history_window: usize,
    /// Idle time after the last prompt edit before it is auto-submitted.
    pub debounce: Duration,
    pub request_timeout: Duration,
    /// Where prompt/completion transcripts go. `None` disables them.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            transcript_dir: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Overlay values returned by `lookup` for each `SIMPLEAI_*` key.
    /// Unparsable values are logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(API_BASE_VAR).filter(|v| !v.trim().is_empty()) {
            self.api_base = base.trim().to_string();
        }
        if let Some(window) = parse_var::<usize>(&lookup, HISTORY_WINDOW_VAR) {
            self.history_window = window;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, DEBOUNCE_MS_VAR) {
            self.debounce = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, TIMEOUT_SECS_VAR) {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup(TRANSCRIPT_DIR_VAR).filter(|v| !v.is_empty()) {
            self.transcript_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}: not a valid value: {:?}", key, raw);
            None
        }
    }
}
