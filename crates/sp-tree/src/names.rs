//! Candidate name validation.
//!
//! Names are basenames, not paths. Rejections carry the offending match so
//! the caller can show the user exactly what to fix.

use crate::error::{Result, TreeError};
use crate::section::SCRIPT_EXTENSION;

/// Characters the target filesystems refuse in entry names.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Characters reserved by the bundle format and the manifest syntax.
const FORMAT_RESERVED_CHARS: &[char] = &['▼', '■', '#'];

/// Windows device names, reserved regardless of extension.
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Validate a candidate section name.
///
/// `strict` additionally rejects any non-ASCII-printable character; needed
/// only when the target runtime cannot auto-detect file encodings.
pub fn validate_name(name: &str, strict: bool) -> Result<()> {
    let reject = |offending: String| {
        Err(TreeError::InvalidName {
            name: name.to_string(),
            offending,
        })
    };

    if name.trim().is_empty() {
        return reject("empty name".to_string());
    }
    if name.starts_with(' ') || name.ends_with(' ') || name.ends_with('.') {
        return reject("leading/trailing space or dot".to_string());
    }
    if let Some(c) = name.chars().find(|c| ILLEGAL_CHARS.contains(c)) {
        return reject(format!("illegal character '{c}'"));
    }
    if let Some(c) = name.chars().find(|c| FORMAT_RESERVED_CHARS.contains(c)) {
        return reject(format!("reserved character '{c}'"));
    }
    if name.chars().any(|c| c.is_control()) {
        return reject("control character".to_string());
    }

    // The stem must not smuggle in the script extension as a bare token.
    let stem = name
        .strip_suffix(&format!(".{SCRIPT_EXTENSION}"))
        .unwrap_or(name);
    if stem.to_ascii_lowercase().contains(".rb") {
        return reject(format!("'.{SCRIPT_EXTENSION}' inside name"));
    }

    let bare = stem.split('.').next().unwrap_or(stem);
    if RESERVED_DEVICE_NAMES
        .iter()
        .any(|d| bare.eq_ignore_ascii_case(d))
    {
        return reject(format!("reserved device name '{bare}'"));
    }

    if strict {
        if let Some(c) = name.chars().find(|c| !matches!(c, ' '..='~')) {
            return reject(format!("non-ASCII character '{c}'"));
        }
    }

    Ok(())
}

/// Coerce an arbitrary bundle-entry title into an acceptable basename.
///
/// Illegal, reserved and control characters become `_`; padding is
/// trimmed. Returns an empty string when nothing usable remains (the caller
/// treats that as a separator).
pub fn sanitize_name(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || FORMAT_RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    // Titles sometimes carry the script extension; it is re-added on disk.
    for pattern in [".rb", ".rB", ".Rb", ".RB"] {
        cleaned = cleaned.replace(pattern, "_");
    }
    let cleaned = cleaned.trim_matches([' ', '.', '_']).to_string();
    if cleaned.is_empty() {
        return cleaned;
    }
    match validate_name(&cleaned, false) {
        Ok(()) => cleaned,
        // Device names and embedded extension tokens get an underscore guard.
        Err(_) => format!("{cleaned}_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offending(name: &str, strict: bool) -> String {
        match validate_name(name, strict) {
            Err(TreeError::InvalidName { offending, .. }) => offending,
            other => panic!("expected InvalidName, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_plain_names() {
        for name in ["main.rb", "Scene_Map.rb", "UI", "0001 - main.rb", "a b"] {
            assert!(validate_name(name, false).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_rejects_illegal_chars() {
        assert!(offending("a/b", false).contains('/'));
        assert!(offending("a?b", false).contains('?'));
        assert!(offending("a:b", false).contains(':'));
    }

    #[test]
    fn test_rejects_format_reserved_chars() {
        assert!(offending("#main.rb", false).contains('#'));
        assert!(offending("▼ Materials", false).contains('▼'));
    }

    #[test]
    fn test_rejects_device_names() {
        assert!(offending("CON", false).contains("CON"));
        assert!(offending("con.rb", false).contains("con"));
        assert!(offending("LPT3.txt", false).contains("LPT3"));
        assert!(validate_name("CONSOLE.rb", false).is_ok());
    }

    #[test]
    fn test_rejects_embedded_extension_token() {
        assert!(offending("main.rb.rb", false).contains(".rb"));
        assert!(offending("a.rb b", false).contains(".rb"));
    }

    #[test]
    fn test_rejects_empty_and_padding() {
        assert!(validate_name("", false).is_err());
        assert!(validate_name("  ", false).is_err());
        assert!(validate_name(" a", false).is_err());
        assert!(validate_name("a.", false).is_err());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("▼ Materials"), "Materials");
        assert_eq!(sanitize_name("Scene_Map"), "Scene_Map");
        assert_eq!(sanitize_name("main.rb"), "main");
        assert_eq!(sanitize_name("a/b?c"), "a_b_c");
        assert_eq!(sanitize_name("CON"), "CON_");
        assert_eq!(sanitize_name("   "), "");
        assert_eq!(sanitize_name(""), "");
    }

    #[test]
    fn test_strict_mode_rejects_non_ascii() {
        assert!(validate_name("héros.rb", false).is_ok());
        assert!(offending("héros.rb", true).contains('é'));
    }
}
