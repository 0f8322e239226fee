//! Binary envelope and request-line codec.
//!
//! The framed envelope is: 4 magic bytes `ZBXD`, one envelope version
//! byte (`0x01`), the body length as an unsigned 64-bit little-endian
//! integer, then the body bytes verbatim. Legacy mode emits the body
//! bytes alone.
//!
//! Response bodies are transcribed one byte per character and the length
//! field counts characters; the protocol is not UTF-8 aware. Values
//! containing newlines are not escaped. Both are protocol limitations,
//! not something this codec papers over.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::ProtocolVersion;

/// Leading magic of the framed envelope.
pub const MAGIC: &[u8; 4] = b"ZBXD";

/// Envelope version byte following the magic.
pub const ENVELOPE_VERSION: u8 = 0x01;

/// Magic + version byte + 64-bit length.
pub const HEADER_LEN: usize = 13;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("truncated frame header: {0} bytes")]
    TruncatedHeader(usize),
    #[error("bad frame magic")]
    BadMagic,
    #[error("frame length mismatch: header declares {declared}, body is {actual}")]
    LengthMismatch { declared: u64, actual: usize },
}

/// Encode one response body for the wire.
pub fn encode_response(body: &str, version: ProtocolVersion) -> Bytes {
    let transcribed: Vec<u8> = body.chars().map(|c| c as u32 as u8).collect();
    match version {
        ProtocolVersion::Legacy => Bytes::from(transcribed),
        ProtocolVersion::Framed => frame_payload(&transcribed),
    }
}

/// Wrap raw payload bytes in the framed envelope. Used for collector
/// pushes, where the payload is already bytes.
pub fn frame_payload(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_slice(MAGIC);
    buf.put_u8(ENVELOPE_VERSION);
    buf.put_u64_le(body.len() as u64);
    buf.put_slice(body);
    buf.freeze()
}

/// Split a complete framed envelope into its declared length and body.
pub fn decode_frame(data: &[u8]) -> Result<(u64, &[u8]), CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::TruncatedHeader(data.len()));
    }
    if &data[..4] != MAGIC || data[4] != ENVELOPE_VERSION {
        return Err(CodecError::BadMagic);
    }
    let mut length = [0u8; 8];
    length.copy_from_slice(&data[5..HEADER_LEN]);
    let declared = u64::from_le_bytes(length);
    let body = &data[HEADER_LEN..];
    if declared != body.len() as u64 {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }
    Ok((declared, body))
}

/// Read one request line: bytes up to a newline (`0x0a`) or end of
/// stream. The newline is not included; the line may be empty.
pub async fn read_request_line<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(line)
}

/// Interpret a request line, stripping the envelope header when the
/// peer sent its request framed.
///
/// Only active in framed mode and only when the line leads with the
/// exact magic-plus-version sequence. A line that looks framed but is
/// shorter than a full header is rejected rather than guessed at.
pub fn strip_frame_header(line: &[u8], version: ProtocolVersion) -> Result<String, CodecError> {
    let framed_lead = line.len() >= 5 && &line[..4] == MAGIC && line[4] == ENVELOPE_VERSION;
    if version.is_framed() && framed_lead {
        if line.len() < HEADER_LEN {
            return Err(CodecError::TruncatedHeader(line.len()));
        }
        return Ok(String::from_utf8_lossy(&line[HEADER_LEN..]).into_owned());
    }
    Ok(String::from_utf8_lossy(line).into_owned())
}
