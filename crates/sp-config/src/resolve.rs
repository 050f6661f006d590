//! Settings resolution: explicit path → env override → game-root file →
//! defaults.

use crate::settings::Settings;
use crate::Result;
use std::path::Path;
use tracing::{debug, info};

/// Default configuration file name at the game root.
pub const CONFIG_FILE_NAME: &str = "scriptpack.json";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "SCRIPTPACK_CONFIG";

/// Load settings for a game directory.
///
/// Resolution order: the `SCRIPTPACK_CONFIG` environment variable, then
/// `scriptpack.json` under `game_root`, then built-in defaults. An absent
/// file is not an error; a malformed one is.
pub fn resolve_settings(game_root: &Path) -> Result<Settings> {
    let candidate = std::env::var_os(CONFIG_ENV_VAR)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| game_root.join(CONFIG_FILE_NAME));

    if !candidate.exists() {
        debug!(path = %candidate.display(), "No config file, using defaults");
        return Ok(Settings::default());
    }

    let text = std::fs::read_to_string(&candidate)?;
    let settings: Settings = serde_json::from_str(&text)?;
    info!(path = %candidate.display(), "Settings loaded");
    Ok(settings)
}
