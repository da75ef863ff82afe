//! Error handling for PrintBridge
//!
//! Provides error types for every layer of the transmission pipeline:
//! - Ring errors (frame buffer capacity and cursor misuse)
//! - G-Code errors (source lines that cannot be framed)
//! - Link errors (controller reply framing and command discipline)
//! - Connection errors (serial transport)
//! - Controller errors (commands the controller refused)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Frame ring error type
///
/// Returned by [`crate::FrameRing`] operations that could not be applied.
/// A failed operation never changes the ring's state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Not enough free bytes to accept another byte; drain and retry
    #[error("Frame ring is full")]
    Full,

    /// The open frame already holds the maximum payload length
    #[error("Frame exceeds the maximum payload of {limit} bytes")]
    FrameTooLong {
        /// The maximum payload length of one frame.
        limit: usize,
    },

    /// The open frame alone fills the ring, so draining cannot make room
    #[error("Frame does not fit in a ring of {capacity} bytes")]
    FrameExceedsCapacity {
        /// The ring capacity in bytes.
        capacity: usize,
    },

    /// `finish` was called without an open frame
    #[error("No open frame to finish")]
    NoOpenFrame,

    /// No committed frame is waiting at the read cursor
    #[error("No frame ready to send")]
    NothingToSend,

    /// No committed frame to remove
    #[error("Frame ring is empty")]
    Empty,
}

impl RingError {
    /// Whether the failure is transient backpressure rather than a fault
    pub fn is_backpressure(&self) -> bool {
        matches!(self, RingError::Full)
    }
}

/// G-Code error type
///
/// Represents source lines that cannot be turned into frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GcodeError {
    /// A rewritten line does not fit in a single frame
    #[error("Line {line_number} is too long to transmit (limit {limit} bytes)")]
    LineTooLong {
        /// Index of the offending line within the upload, counting from 1.
        line_number: u32,
        /// The maximum framed line length.
        limit: usize,
    },
}

/// Controller link error type
///
/// Represents violations of the reply framing or of the single outstanding
/// command discipline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A reply line exceeded the accumulator; the rest of it is discarded
    #[error("Reply line exceeds {limit} bytes")]
    ReplyTooLong {
        /// The maximum reply line length.
        limit: usize,
    },

    /// A command was registered while another one is still outstanding
    #[error("A command is already awaiting a reply")]
    CommandOutstanding,
}

/// Connection error type
///
/// Represents errors related to the byte transport to the controller.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Controller error type
///
/// Represents commands or upload steps the controller did not accept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Command was rejected by controller
    #[error("Command '{command}' rejected: {reason}")]
    CommandRejected {
        /// The command line that was sent.
        command: String,
        /// The controller's error text.
        reason: String,
    },

    /// An upload operation was called outside an active upload
    #[error("No upload in progress")]
    UploadNotActive,

    /// `begin_upload` was called while another upload is active
    #[error("Upload of '{filename}' already in progress")]
    UploadInProgress {
        /// The file currently being uploaded.
        filename: String,
    },

    /// The upload was aborted by an earlier error
    #[error("Upload aborted: {reason}")]
    UploadAborted {
        /// The error that aborted the upload.
        reason: String,
    },
}

/// Main error type for PrintBridge
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame ring error
    #[error(transparent)]
    Ring(#[from] RingError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Controller link error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this error is ring backpressure
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Error::Ring(e) if e.is_backpressure())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Check if this error means a line could not be transmitted at all
    pub fn is_oversized_line(&self) -> bool {
        matches!(
            self,
            Error::Gcode(GcodeError::LineTooLong { .. })
                | Error::Link(LinkError::ReplyTooLong { .. })
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
