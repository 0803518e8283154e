//! Error types for DNS resolution

use thiserror::Error;

/// Result type alias for DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, resolving, or serving DNS
#[derive(Debug, Error)]
pub enum Error {
    /// Input ended before a complete message could be read
    #[error("truncated message: expected at least {expected} bytes, got {actual}")]
    TruncatedInput { expected: usize, actual: usize },

    /// A name label is malformed (reserved length bits, non-ASCII, overlong name)
    #[error("invalid label at offset {0}")]
    InvalidLabel(usize),

    /// Name compression pointers exceeded the hop budget
    #[error("compression pointer loop")]
    PointerLoop,

    /// A question carried a class other than IN
    #[error("unsupported query class {0}")]
    UnsupportedClass(u16),

    /// No source holds an entry for the name; the chain falls through on this
    #[error("no entry found for {0}")]
    NotFound(String),

    /// The upstream transport failed (socket, HTTP)
    #[error("transport error: {0}")]
    Transport(String),

    /// An upstream interaction exceeded its deadline
    #[error("timeout: {0}")]
    Timeout(String),

    /// The upstream replied with bytes that do not parse as DNS
    #[error("corrupt upstream response: {0}")]
    UpstreamCorrupt(String),

    /// Configuration error; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to parse the configuration file
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the miss that lets the resolver chain fall through
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for wire-format violations in an inbound datagram
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::TruncatedInput { .. }
                | Error::InvalidLabel(_)
                | Error::PointerLoop
                | Error::UnsupportedClass(_)
        )
    }
}
