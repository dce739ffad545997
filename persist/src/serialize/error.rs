//! Error types for entity persistence.
//!
//! [`PersistError`] covers failures scoped to a single entity (or one of its
//! fields); the container orchestrator contains these and keeps going.
//! [`ContainerError`] covers structural faults in the save file itself and
//! aborts the whole operation.

use std::fmt;

/// Errors scoped to one entity's payload.
#[derive(Debug)]
pub enum PersistError {
    /// A member has no persisted field with this name.
    UnknownField { record: String, field: String },
    /// A decoded value could not be converted into the field's Rust type.
    FieldError { field: String, message: String },
    /// A custom serializer or deserializer rejected the value.
    Custom { type_name: String, message: String },
    /// Format encoding/decoding error (RON/bincode).
    FormatError(String),
    /// The payload block is shorter than its own length prefixes claim.
    MalformedPayload(String),
}

impl PersistError {
    /// Convenience constructor for custom serializer callbacks.
    pub fn custom(type_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Custom {
            type_name: type_name.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { record, field } => {
                write!(f, "record '{record}' has no persisted field '{field}'")
            }
            Self::FieldError { field, message } => {
                write!(f, "failed to apply field '{field}': {message}")
            }
            Self::Custom { type_name, message } => {
                write!(f, "custom serializer for '{type_name}' failed: {message}")
            }
            Self::FormatError(msg) => write!(f, "format error: {msg}"),
            Self::MalformedPayload(msg) => write!(f, "malformed payload: {msg}"),
        }
    }
}

impl std::error::Error for PersistError {}

/// Structural errors in a save container.
///
/// Any of these aborts the save/load call. Entities that finished loading
/// before the fault stay live in the world.
#[derive(Debug)]
pub enum ContainerError {
    /// An IO error occurred while reading or writing the container.
    Io(std::io::Error),
    /// The stream ended before the container was complete.
    Truncated,
    /// The header magic does not match this container version.
    BadMagic { expected: u32, found: u32 },
    /// A length prefix exceeds the configured limit.
    LengthTooLarge { what: &'static str, len: u32, max: u32 },
    /// A directory string is not valid UTF-8.
    InvalidString,
    /// A count or length does not fit in a `u32` prefix.
    Oversize(usize),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Truncated => write!(f, "unexpected end of container"),
            Self::BadMagic { expected, found } => {
                write!(f, "bad container magic: expected {expected:#010x}, found {found:#010x}")
            }
            Self::LengthTooLarge { what, len, max } => {
                write!(f, "{what} length {len} exceeds limit {max}")
            }
            Self::InvalidString => write!(f, "container string is not valid UTF-8"),
            Self::Oversize(n) => write!(f, "{n} does not fit in a u32 length prefix"),
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ContainerError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ContainerError::Truncated
        } else {
            ContainerError::Io(err)
        }
    }
}
