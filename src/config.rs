//! Configuration management with environment variable support.
//!
//! Centralized configuration for spotcheck, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults for local runs
//! - A cached global accessor for library consumers
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SPOTCHECK_UPDATE` | Update baselines instead of failing on change | `false` |
//! | `SPOTCHECK_PRESERVE` | Keep browsers alive (and visible) between runs | `false` |
//! | `SPOTCHECK_MAX_BROWSERS` | Maximum concurrent browser processes | `10` |
//! | `SPOTCHECK_OUTPUT_DIR` | Directory for baselines and diff artifacts | `__screenshots__` |
//! | `GITHUB_ACTIONS` | Detected CI; disables the Chrome sandbox | unset |

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default baseline/artifact directory, resolved relative to the caller
pub const DEFAULT_OUTPUT_DIR: &str = "__screenshots__";

/// Default maximum number of pooled browser processes
pub const DEFAULT_MAX_BROWSERS: usize = 10;

/// Default browser window width (pixels)
pub const DEFAULT_WINDOW_WIDTH: u32 = 800;

/// Default browser window height (pixels)
pub const DEFAULT_WINDOW_HEIGHT: u32 = 600;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable that forces baseline updates
pub const ENV_UPDATE: &str = "SPOTCHECK_UPDATE";

/// Environment variable that preserves browsers after release
pub const ENV_PRESERVE: &str = "SPOTCHECK_PRESERVE";

/// Environment variable for the browser pool size
pub const ENV_MAX_BROWSERS: &str = "SPOTCHECK_MAX_BROWSERS";

/// Environment variable for the baseline directory
pub const ENV_OUTPUT_DIR: &str = "SPOTCHECK_OUTPUT_DIR";

/// Environment variable set by the CI runner
pub const ENV_CI: &str = "GITHUB_ACTIONS";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for spotcheck
#[derive(Debug, Clone)]
pub struct Config {
    /// Update baselines instead of reporting a stale one
    pub update: bool,
    /// Keep browser processes alive when released back to the pool
    pub preserve_browser: bool,
    /// Maximum concurrent browser processes
    pub max_browsers: usize,
    /// Directory for baselines and diff artifacts
    pub output_dir: String,
    /// Running under CI (sandbox flags differ)
    pub ci: bool,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            update: env_bool(ENV_UPDATE).unwrap_or(false),
            preserve_browser: env_bool(ENV_PRESERVE).unwrap_or(false),
            max_browsers: env::var(ENV_MAX_BROWSERS)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n >= 1)
                .unwrap_or(DEFAULT_MAX_BROWSERS),
            output_dir: env::var(ENV_OUTPUT_DIR).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            ci: env_bool(ENV_CI).unwrap_or(false),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            update: false,
            preserve_browser: false,
            max_browsers: DEFAULT_MAX_BROWSERS,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            ci: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Read a boolean environment variable.
/// Accepts "true"/"1"/"yes" and "false"/"0"/"no"/"" (case-insensitive).
fn env_bool(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    parse_bool(&raw)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
