//! Typed settings for the editor engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line ending policy for the load-order manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    /// CRLF on Windows, LF elsewhere.
    Native,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Native => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEnding::Lf => write!(f, "lf"),
            LineEnding::CrLf => write!(f, "crlf"),
            LineEnding::Native => write!(f, "native"),
        }
    }
}

/// Editor engine settings, all defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scripts directory name, relative to the game root.
    pub scripts_folder: String,

    /// Load-order manifest file name inside the scripts directory.
    pub manifest_name: String,

    /// Crash artifact path the emitted loader writes, relative to the game
    /// root.
    pub crash_log: String,

    /// Bundle file path, relative to the game root.
    pub bundle_file: String,

    /// Manifest line ending policy.
    pub line_ending: LineEnding,

    /// Reject non-ASCII-printable characters in names. Needed only for
    /// source encodings that cannot auto-detect file encoding.
    pub strict_names: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scripts_folder: "Scripts".to_string(),
            manifest_name: "load_order.txt".to_string(),
            crash_log: "scriptpack_crash.dat".to_string(),
            bundle_file: "Data/Scripts.rvdata2".to_string(),
            line_ending: LineEnding::default(),
            strict_names: false,
        }
    }
}
