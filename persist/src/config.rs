use std::path::Path;

use serde::Deserialize;

use crate::serialize::Format;

/// Save/load settings, usually read from a `persist.toml`.
///
/// ```toml
/// payload_format = "ron"
/// max_block_len = 1048576
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Encoding of each entity's flat map. Writer and reader must agree.
    pub payload_format: Format,
    /// Largest payload block accepted on load, in bytes.
    pub max_block_len: u32,
    /// Largest directory string accepted on load, in bytes.
    pub max_string_len: u32,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            payload_format: Format::Bincode,
            max_block_len: 64 * 1024 * 1024,
            max_string_len: 1024 * 1024,
        }
    }
}

impl PersistConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse persist config: {e}"))
    }

    /// Loads a config from a TOML file.
    ///
    /// Returns `Err` with a human-readable message if the file cannot be read
    /// or parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(PersistConfig::from_toml_str("").unwrap(), PersistConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = PersistConfig::from_toml_str("payload_format = \"ron\"\nmax_block_len = 128\n")
            .unwrap();
        assert_eq!(config.payload_format, Format::Ron);
        assert_eq!(config.max_block_len, 128);
        assert_eq!(config.max_string_len, PersistConfig::default().max_string_len);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(PersistConfig::from_toml_str("payload_format = \"json\"").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = PersistConfig::load(Path::new("/nonexistent/persist.toml")).unwrap_err();
        assert!(err.contains("failed to read"));
    }
}
