//! Binary wire codec and framing.
//!
//! Field order on the wire is fixed: kind (1 byte), sent_at_nanos (8 bytes,
//! big-endian), sender (1-byte length + data), recipient (1-byte length +
//! data), text (2-byte length + data). Decoding is strict: unknown kinds,
//! short buffers, bad UTF-8, and trailing bytes are all rejected, and a
//! `Message` is never partially populated.
//!
//! On the stream each encoded payload travels behind a 4-byte big-endian
//! length prefix, so one logical message survives arbitrary read
//! fragmentation by the transport.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::CodecError;
use crate::message::{Message, MessageKind};

/// Maximum encoded payload length accepted on the wire
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Bytes of the frame length prefix
pub const LEN_PREFIX_SIZE: usize = 4;

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Encode a message to its wire payload (without the length prefix)
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    message.validate()?;

    let sender = message.sender.as_bytes();
    let recipient = message.recipient.as_bytes();
    let text = message.text.as_bytes();

    let mut bytes = Vec::with_capacity(13 + sender.len() + recipient.len() + text.len());

    bytes.push(message.kind.as_u8());
    bytes.extend_from_slice(&message.sent_at_nanos.to_be_bytes());

    bytes.push(sender.len() as u8);
    bytes.extend_from_slice(sender);

    bytes.push(recipient.len() as u8);
    bytes.extend_from_slice(recipient);

    bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
    bytes.extend_from_slice(text);

    Ok(bytes)
}

/// Decode a wire payload into a message
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    if bytes.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len: bytes.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut offset = 0;

    let kind = MessageKind::from_u8(take(bytes, &mut offset, 1, "kind")?[0])?;

    let ts_bytes: [u8; 8] = take(bytes, &mut offset, 8, "timestamp")?
        .try_into()
        .map_err(|_| CodecError::TooShort { field: "timestamp" })?;
    let sent_at_nanos = i64::from_be_bytes(ts_bytes);

    let sender = read_string_u8(bytes, &mut offset, "sender")?;
    let recipient = read_string_u8(bytes, &mut offset, "recipient")?;

    let text_len_bytes: [u8; 2] = take(bytes, &mut offset, 2, "text length")?
        .try_into()
        .map_err(|_| CodecError::TooShort { field: "text length" })?;
    let text_len = u16::from_be_bytes(text_len_bytes) as usize;
    let text_bytes = take(bytes, &mut offset, text_len, "text")?;
    let text = String::from_utf8(text_bytes.to_vec())
        .map_err(|_| CodecError::InvalidUtf8 { field: "text" })?;

    if offset != bytes.len() {
        return Err(CodecError::TrailingData(bytes.len() - offset));
    }

    let message = Message {
        kind,
        sent_at_nanos,
        sender,
        recipient,
        text,
    };

    message.validate()?;
    Ok(message)
}

fn take<'a>(
    bytes: &'a [u8],
    offset: &mut usize,
    len: usize,
    field: &'static str,
) -> Result<&'a [u8], CodecError> {
    if bytes.len() < *offset + len {
        return Err(CodecError::TooShort { field });
    }
    let slice = &bytes[*offset..*offset + len];
    *offset += len;
    Ok(slice)
}

fn read_string_u8(
    bytes: &[u8],
    offset: &mut usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let len = take(bytes, offset, 1, field)?[0] as usize;
    let data = take(bytes, offset, len, field)?;
    String::from_utf8(data.to_vec()).map_err(|_| CodecError::InvalidUtf8 { field })
}

// ----------------------------------------------------------------------------
// Framing
// ----------------------------------------------------------------------------

/// Prepend the length prefix to an encoded payload
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Encode a message and wrap it in a frame, ready to write to a stream
pub fn encode_framed(message: &Message) -> Result<Vec<u8>, CodecError> {
    Ok(frame(&encode(message)?))
}

/// Read one length-prefixed payload from a stream.
///
/// Returns `Ok(None)` on clean end-of-stream at a frame boundary. An
/// oversized length prefix poisons the stream (there is no way to resync),
/// so it surfaces as an `InvalidData` I/O error rather than a codec error.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; LEN_PREFIX_SIZE];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {} exceeds maximum {}", len, MAX_FRAME_LEN),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one length-prefixed payload to a stream
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame(payload)).await?;
    writer.flush().await
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
