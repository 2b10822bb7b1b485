//! Wire-level message model.
//!
//! A `Message` is the single unit of communication: the first frame a client
//! sends is a `Handshake` claiming a nickname, everything after that is
//! `Chat`, and the server answers protocol rejections with `System` frames.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::CodecError;

/// Maximum byte length of a nickname (sender or recipient)
pub const MAX_NICK_LEN: usize = 255;

/// Maximum byte length of the text payload
pub const MAX_TEXT_LEN: usize = u16::MAX as usize;

/// Current server time in nanoseconds since the Unix epoch
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

// ----------------------------------------------------------------------------
// Message Kind
// ----------------------------------------------------------------------------

/// Discriminates the three frame types on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MessageKind {
    /// First frame from a client, declaring its desired nickname
    Handshake = 0x01,
    /// Regular chat message, broadcast or directed
    Chat = 0x02,
    /// Server-originated notification, no authenticated sender
    System = 0x03,
}

impl MessageKind {
    /// Convert from raw wire byte
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0x01 => Ok(MessageKind::Handshake),
            0x02 => Ok(MessageKind::Chat),
            0x03 => Ok(MessageKind::System),
            _ => Err(CodecError::UnknownKind { value }),
        }
    }

    /// Convert to raw wire byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// One chat relay message, in memory and on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Frame type
    pub kind: MessageKind,
    /// Receipt timestamp in nanoseconds, stamped by the server. Client-supplied
    /// values are never trusted and get overwritten on arrival.
    pub sent_at_nanos: i64,
    /// Sender nickname; empty only for System frames
    pub sender: String,
    /// Recipient nickname; empty means broadcast
    pub recipient: String,
    /// UTF-8 payload
    pub text: String,
}

impl Message {
    /// Create a handshake frame claiming `nickname`
    pub fn handshake<S: Into<String>>(nickname: S) -> Self {
        Self {
            kind: MessageKind::Handshake,
            sent_at_nanos: 0,
            sender: nickname.into(),
            recipient: String::new(),
            text: String::new(),
        }
    }

    /// Create a chat frame; empty `recipient` broadcasts
    pub fn chat<S, R, T>(sender: S, recipient: R, text: T) -> Self
    where
        S: Into<String>,
        R: Into<String>,
        T: Into<String>,
    {
        Self {
            kind: MessageKind::Chat,
            sent_at_nanos: 0,
            sender: sender.into(),
            recipient: recipient.into(),
            text: text.into(),
        }
    }

    /// Create a server-originated system frame
    pub fn system<T: Into<String>>(text: T) -> Self {
        Self {
            kind: MessageKind::System,
            sent_at_nanos: now_nanos(),
            sender: String::new(),
            recipient: String::new(),
            text: text.into(),
        }
    }

    /// True when this message fans out to every registered session
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_empty()
    }

    /// Validate structural invariants before encoding or routing
    pub fn validate(&self) -> Result<(), CodecError> {
        match self.kind {
            MessageKind::Handshake | MessageKind::Chat => {
                if self.sender.is_empty() {
                    return Err(CodecError::InvalidMessage {
                        reason: format!("{:?} frame requires a sender", self.kind),
                    });
                }
            }
            MessageKind::System => {
                if !self.sender.is_empty() {
                    return Err(CodecError::InvalidMessage {
                        reason: "system frame carries no sender".into(),
                    });
                }
            }
        }

        if self.sender.len() > MAX_NICK_LEN {
            return Err(CodecError::FieldTooLong {
                field: "sender",
                len: self.sender.len(),
                max: MAX_NICK_LEN,
            });
        }

        if self.recipient.len() > MAX_NICK_LEN {
            return Err(CodecError::FieldTooLong {
                field: "recipient",
                len: self.recipient.len(),
                max: MAX_NICK_LEN,
            });
        }

        if self.text.len() > MAX_TEXT_LEN {
            return Err(CodecError::FieldTooLong {
                field: "text",
                len: self.text.len(),
                max: MAX_TEXT_LEN,
            });
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
