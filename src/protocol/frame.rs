//! # Frame Encoding
//!
//! Every command travels in one fixed-header frame:
//!
//! | Offset | Size | Value |
//! |--------|------|-------|
//! | 0 | 2 | Magic `0x51 0x78` |
//! | 2 | 1 | Command id |
//! | 3 | 1 | `0x00` (direction; replies from the device carry `0x01`) |
//! | 4 | 1 | Payload length |
//! | 5 | 1 | `0x00` |
//! | 6 | n | Payload |
//! | 6+n | 1 | CRC-8 of the payload only |
//! | 7+n | 1 | Terminator `0xFF` |
//!
//! ```text
//! 51 78 A3 00 01 00 00 00 FF    GetDevState, payload [00]
//! ```

use super::checksum::checksum;
use crate::error::PrinterError;

/// Frame magic bytes.
pub const MAGIC: [u8; 2] = [0x51, 0x78];

/// Frame terminator byte.
pub const TERMINATOR: u8 = 0xFF;

/// Header length (magic, command, direction, length, reserved).
pub const HEADER_LEN: usize = 6;

/// Bytes added around the payload (header + checksum + terminator).
pub const OVERHEAD: usize = HEADER_LEN + 2;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Encode one command frame.
///
/// Fails with [`PrinterError::Protocol`] when `data` is longer than
/// [`MAX_PAYLOAD`]; callers chunk multi-byte feeds beforehand.
///
/// ## Example
///
/// ```
/// use catprint::protocol::frame::encode_frame;
///
/// let frame = encode_frame(0xA3, &[0x00]).unwrap();
/// assert_eq!(frame, vec![0x51, 0x78, 0xA3, 0x00, 0x01, 0x00, 0x00, 0x00, 0xFF]);
/// ```
pub fn encode_frame(command: u8, data: &[u8]) -> Result<Vec<u8>, PrinterError> {
    let len = u8::try_from(data.len()).map_err(|_| {
        PrinterError::Protocol(format!(
            "payload too large: {} bytes (max {})",
            data.len(),
            MAX_PAYLOAD
        ))
    })?;

    Ok(assemble(command, len, data))
}

/// Encode a frame whose payload length is known at compile time.
///
/// Payloads longer than [`MAX_PAYLOAD`] are rejected at compile time, so this
/// cannot fail.
pub fn encode_fixed<const N: usize>(command: u8, data: [u8; N]) -> Vec<u8> {
    const { assert!(N <= MAX_PAYLOAD) };
    assemble(command, N as u8, &data)
}

fn assemble(command: u8, len: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(OVERHEAD + data.len());
    frame.extend_from_slice(&MAGIC);
    frame.push(command);
    frame.push(0x00);
    frame.push(len);
    frame.push(0x00);
    frame.extend_from_slice(data);
    frame.push(checksum(data));
    frame.push(TERMINATOR);
    frame
}

/// Append an encoded frame to `out`.
pub fn push_frame(out: &mut Vec<u8>, command: u8, data: &[u8]) -> Result<(), PrinterError> {
    out.extend(encode_frame(command, data)?);
    Ok(())
}

/// Total encoded length of the frame starting at `bytes[0]`, if the header is present.
pub fn frame_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < HEADER_LEN || bytes[..2] != MAGIC {
        return None;
    }
    Some(OVERHEAD + bytes[4] as usize)
}

/// Decode one complete frame into `(command, payload)`.
///
/// Accepts both host frames (direction byte `0x00`) and device replies
/// (`0x01`). Trailing bytes after the terminator are rejected.
pub fn decode_frame(bytes: &[u8]) -> Result<(u8, Vec<u8>), PrinterError> {
    let total = frame_len(bytes)
        .ok_or_else(|| PrinterError::Protocol("missing frame header".to_string()))?;

    if bytes.len() != total {
        return Err(PrinterError::Protocol(format!(
            "frame length mismatch: header declares {} bytes, got {}",
            total,
            bytes.len()
        )));
    }

    let command = bytes[2];
    let data = &bytes[HEADER_LEN..total - 2];
    let crc = bytes[total - 2];

    if bytes[total - 1] != TERMINATOR {
        return Err(PrinterError::Protocol(format!(
            "bad terminator {:#04x}",
            bytes[total - 1]
        )));
    }
    let expected = checksum(data);
    if crc != expected {
        return Err(PrinterError::Protocol(format!(
            "checksum mismatch: expected {:#04x}, got {:#04x}",
            expected, crc
        )));
    }

    Ok((command, data.to_vec()))
}

/// Split a compiled command stream into its frames.
///
/// Fails on the first malformed frame.
pub fn split_frames(mut bytes: &[u8]) -> Result<Vec<(u8, Vec<u8>)>, PrinterError> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let len = frame_len(bytes)
            .filter(|&len| len <= bytes.len())
            .ok_or_else(|| {
                PrinterError::Protocol(format!("truncated frame at {} remaining bytes", bytes.len()))
            })?;
        frames.push(decode_frame(&bytes[..len])?);
        bytes = &bytes[len..];
    }
    Ok(frames)
}
