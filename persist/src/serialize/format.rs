//! Payload encoding and decoding.
//!
//! Provides [`encode`] and [`decode`] functions that convert between
//! serde-serializable types and byte buffers in RON or bincode format.
//! The container stores each entity's flat map in one of these formats;
//! writer and reader must agree on the choice.

use serde::{Deserialize, Serialize};

use super::error::PersistError;

/// Supported payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// RON text. Handy when inspecting a save by hand.
    Ron,
    /// Compact binary.
    #[default]
    Bincode,
}

/// Encode a serde-serializable value to bytes in the given format.
pub fn encode<T: serde::Serialize>(value: &T, format: Format) -> Result<Vec<u8>, PersistError> {
    match format {
        Format::Ron => ron::ser::to_string(value)
            .map(|s| s.into_bytes())
            .map_err(|e| PersistError::FormatError(e.to_string())),
        Format::Bincode => {
            bincode::serialize(value).map_err(|e| PersistError::FormatError(e.to_string()))
        }
    }
}

/// Decode bytes in the given format to a serde-deserializable type.
pub fn decode<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
    format: Format,
) -> Result<T, PersistError> {
    match format {
        Format::Ron => {
            let s =
                std::str::from_utf8(bytes).map_err(|e| PersistError::FormatError(e.to_string()))?;
            ron::from_str(s).map_err(|e| PersistError::FormatError(e.to_string()))
        }
        Format::Bincode => {
            bincode::deserialize(bytes).map_err(|e| PersistError::FormatError(e.to_string()))
        }
    }
}
