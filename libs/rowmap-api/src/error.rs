use std::fmt;

/// Boxed error produced by cursor and executor implementations.
///
/// The engine never inspects it; it is surfaced verbatim to the caller.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error kind for decode errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// NULL stored into a non-nullable target.
    Null,
    /// Value variant cannot be converted to the target type.
    Type,
    /// Numeric value out of the target's range.
    Range,
    /// Text or bytes failed to parse (UTF-8, JSON, ...).
    Format,
    /// Target type offers no decode slot at all.
    Unsupported,
    /// Failure reported by the driver itself while producing the row.
    Driver,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Null => f.write_str("null"),
            ErrorKind::Type => f.write_str("type"),
            ErrorKind::Range => f.write_str("range"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Unsupported => f.write_str("unsupported"),
            ErrorKind::Driver => f.write_str("driver"),
        }
    }
}

/// Decode error returned by [`Decode`](crate::decode::Decode) impls and by
/// [`Cursor::decode_into`](crate::cursor::Cursor::decode_into).
#[derive(Debug, Clone)]
pub struct DecodeError {
    kind: ErrorKind,
    message: String,
}

impl DecodeError {
    pub fn null(target: &str) -> Self {
        Self {
            kind: ErrorKind::Null,
            message: format!("converting NULL to {target} is unsupported"),
        }
    }

    pub fn mismatch(source: &str, target: &str) -> Self {
        Self {
            kind: ErrorKind::Type,
            message: format!("unsupported conversion from {source} into {target}"),
        }
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Range, message: msg.into() }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn unsupported(target: &str) -> Self {
        Self {
            kind: ErrorKind::Unsupported,
            message: format!("unsupported scan, storing into {target}"),
        }
    }

    pub fn driver(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Driver, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }

    /// Name the result column that failed.
    pub fn with_column(self, index: usize, name: &str) -> Self {
        self.with_context(format!("column {index} ({name})"))
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DecodeError {}

// ---------------------------------------------------------------------------
// From impls: standard error types → DecodeError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<std::convert::Infallible> for DecodeError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

impl From<std::num::TryFromIntError> for DecodeError {
    fn from(e: std::num::TryFromIntError) -> Self {
        Self::range(e.to_string())
    }
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::format(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::format(e.to_string())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::format(e.to_string())
    }
}
