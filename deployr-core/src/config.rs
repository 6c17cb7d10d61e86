//! Locations of the imaging utilities and supervision settings.
use crate::platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DISM_PATH_ENV: &str = "DEPLOYR_DISM_PATH";
pub const WIMLIB_PATH_ENV: &str = "DEPLOYR_WIMLIB_PATH";
pub const TERMINATION_GRACE_ENV: &str = "DEPLOYR_TERMINATION_GRACE_MS";

/// Settings shared by every imaging backend.
///
/// Missing fields take their defaults when deserialized, so an embedding
/// application can keep only the values it overrides in its own config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub dism_path: PathBuf,
    pub wimlib_path: PathBuf,
    /// How long a cancelled utility may take to exit before it is killed.
    pub termination_grace_ms: u64,
    /// How many trailing output lines are kept for error reports.
    pub transcript_lines: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            dism_path: platform::default_dism_path(),
            wimlib_path: platform::default_wimlib_path(),
            termination_grace_ms: 5_000,
            transcript_lines: 200,
        }
    }
}

impl ToolConfig {
    /// Defaults, overridden by `DEPLOYR_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(DISM_PATH_ENV).filter(|v| !v.is_empty()) {
            self.dism_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(WIMLIB_PATH_ENV).filter(|v| !v.is_empty()) {
            self.wimlib_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(TERMINATION_GRACE_ENV) {
            match raw.parse() {
                Ok(ms) => self.termination_grace_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", TERMINATION_GRACE_ENV),
            }
        }
        self
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}
