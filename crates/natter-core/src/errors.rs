//! Error types for the natter protocol and session engine.
//!
//! Each concern gets its own enum; `NatterError` unifies them for callers
//! that cross layer boundaries. Every failure here is scoped to one frame or
//! one session — nothing in this taxonomy is meant to take the process down.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Codec Errors
// ----------------------------------------------------------------------------

/// Wire codec failures: malformed, truncated, or oversized frames
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too short for {field}")]
    TooShort { field: &'static str },

    #[error("unknown message kind: {value:#04x}")]
    UnknownKind { value: u8 },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("frame has {0} trailing bytes")]
    TrailingData(usize),

    #[error("frame payload too large ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },
}

// ----------------------------------------------------------------------------
// Registry Errors
// ----------------------------------------------------------------------------

/// Session registry rejections
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("nickname {nickname} already connected")]
    NicknameTaken { nickname: String },
}

// ----------------------------------------------------------------------------
// Persistence Errors
// ----------------------------------------------------------------------------

/// Failures from a persistence backend. Never fatal to routing.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {reason}")]
    Backend { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Top-level error type for the natter relay
#[derive(Debug, Error)]
pub enum NatterError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("handshake failed for {peer}: {reason}")]
    Handshake { peer: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NatterError {
    /// Create a handshake failure for a peer
    pub fn handshake<P: Into<String>, R: Into<String>>(peer: P, reason: R) -> Self {
        NatterError::Handshake {
            peer: peer.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NatterError>;
