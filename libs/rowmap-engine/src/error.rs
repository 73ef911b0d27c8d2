use rowmap_api::error::{BoxError, DecodeError};

/// Why a struct-only scan rejected its element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructOnlyReason {
    /// Built-in single value (integer, text, ...).
    Primitive,
    /// Struct with its own `Decode` impl.
    Decoder,
    /// Struct with no mappable fields.
    NoFields,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("scalar destination {type_name} needs exactly one column, result has {columns}")]
    ShapeMismatch { type_name: &'static str, columns: usize },

    #[error("missing destination name {column} in {type_name}")]
    MissingField { column: String, type_name: &'static str },

    #[error("{}", struct_only_message(.type_name, .reason))]
    StructOnlyViolation { type_name: &'static str, reason: StructOnlyReason },

    #[error("no rows in result set")]
    NoRows,

    #[error("cursor error: {0}")]
    Cursor(#[source] BoxError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

fn struct_only_message(type_name: &str, reason: &StructOnlyReason) -> String {
    match reason {
        StructOnlyReason::Primitive => {
            format!("expected a struct destination but got primitive {type_name}")
        }
        StructOnlyReason::Decoder => {
            format!("struct scan expects a struct dest but the provided struct type {type_name} implements Decode")
        }
        StructOnlyReason::NoFields => {
            format!("expected a struct, but struct {type_name} has no mappable fields")
        }
    }
}

impl ScanError {
    /// Add context to the error.
    ///
    /// For `Decode` variant, context is added to the inner `DecodeError`.
    /// For `InvalidDestination`, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            ScanError::Decode(e) => ScanError::Decode(e.with_context(ctx)),
            ScanError::InvalidDestination(msg) => {
                ScanError::InvalidDestination(format!("{ctx}: {msg}"))
            }
            other => other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
}
