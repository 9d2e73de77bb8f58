//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use juno_datalog::EngineLimits;

/// Fallback when neither an explicit version nor a `VERSION` file exists.
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Directory of `*.json` rule files; `None` serves an empty program.
    pub rules_dir: Option<PathBuf>,
    pub limits: EngineLimits,
    /// Used when a request carries no `timeout_ms`.
    pub default_timeout: Duration,
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8088,
            rules_dir: None,
            limits: EngineLimits::default(),
            default_timeout: Duration::from_millis(5_000),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

/// Pick the reported version: explicit value, then the first line of
/// `version_file`, then the crate version.
pub fn resolve_version(explicit: Option<String>, version_file: &Path) -> String {
    if let Some(version) = explicit.filter(|v| !v.trim().is_empty()) {
        return version.trim().to_string();
    }
    std::fs::read_to_string(version_file)
        .ok()
        .and_then(|contents| contents.lines().next().map(|l| l.trim().to_string()))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}
