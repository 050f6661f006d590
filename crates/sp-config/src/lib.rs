//! scriptpack configuration loading and validation.
//!
//! Settings live in a `scriptpack.json` file at the game root; every field
//! has a default so an absent or partial file is fine. Components receive
//! their settings by explicit parameter, never through globals.

pub mod resolve;
pub mod settings;

pub use resolve::{resolve_settings, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
pub use settings::{LineEnding, Settings};

use thiserror::Error;

/// Schema version for the configuration file.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
