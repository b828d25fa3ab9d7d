//! Unified error types for aesdsocket

use thiserror::Error;

/// Main error type for store and server operations
#[derive(Error, Debug)]
pub enum AesdError {
    /// Seek or control-call parameters were out of range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation failed while assembling a command
    #[error("out of memory")]
    OutOfMemory,

    /// A blocking primitive (lock, control call) was interrupted
    #[error("interrupted")]
    Interrupted,

    /// Underlying I/O failed (socket, file, ioctl)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection before a full command arrived
    #[error("peer closed connection mid-message")]
    PeerClosed,

    /// A control call carried an unrecognized code or malformed payload
    #[error("unknown or malformed control: {0}")]
    UnknownControl(String),
}

/// Result type alias for aesdsocket operations
pub type Result<T> = std::result::Result<T, AesdError>;

impl AesdError {
    /// Create an invalid-argument error with context
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether a worker encountering this error should just abandon the
    /// current request rather than treat it as fatal
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AesdError::InvalidArgument(_)
                | AesdError::Interrupted
                | AesdError::PeerClosed
                | AesdError::UnknownControl(_)
        )
    }
}
