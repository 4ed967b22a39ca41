//! Frame codec and the single write-then-read exchange.
//!
//! A request is the payload left-aligned in a zero-padded 64-byte buffer. A
//! reply carries an echoed opcode at byte 0 and, for string replies, text
//! from byte 1 up to the first NUL.

use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::protocol::{FRAME_SIZE, MAX_PAYLOAD, REPLY_PAYLOAD_OFFSET};
use crate::transport::{Endpoints, UsbHandle};

/// One fixed-size protocol message.
pub type Frame = [u8; FRAME_SIZE];

/// Build a request frame. Fails with `MessageTooLong` above 63 bytes.
pub fn encode_frame(payload: &[u8]) -> Result<Frame> {
    if payload.len() > MAX_PAYLOAD {
        return Err(RelayError::MessageTooLong(payload.len()));
    }
    let mut frame = [0u8; FRAME_SIZE];
    frame[..payload.len()].copy_from_slice(payload);
    Ok(frame)
}

/// Decode the NUL-terminated string starting at byte 1 of a reply.
///
/// `what` names the reply for the error message. Invalid UTF-8 is replaced
/// rather than rejected.
pub fn decode_string(frame: &Frame, what: &str) -> Result<String> {
    let body = &frame[REPLY_PAYLOAD_OFFSET..];
    let end = body
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| RelayError::MalformedReply(what.to_string()))?;
    Ok(String::from_utf8_lossy(&body[..end]).to_string())
}

/// Like [`decode_string`], but a missing terminator is only a warning and
/// yields an empty string. The caller may simply retry the query.
pub fn decode_string_or_empty(frame: &Frame, what: &str, label: &str) -> String {
    match decode_string(frame, what) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("{label}: failed to read {what} correctly ({e})");
            String::new()
        }
    }
}

/// Send one request frame and read back exactly one reply frame.
///
/// The payload is validated before any I/O. A short read is zero-padded to
/// 64 bytes; an overlong one is truncated.
pub fn write_frame<H: UsbHandle>(
    handle: &mut H,
    endpoints: Endpoints,
    payload: &[u8],
    timeout: Duration,
) -> Result<Frame> {
    let request = encode_frame(payload)?;
    handle.write(endpoints.out_addr, &request, timeout)?;
    let raw = handle.read(endpoints.in_addr, FRAME_SIZE, timeout)?;
    if raw.len() != FRAME_SIZE {
        log::debug!("reply was {} bytes, expected {FRAME_SIZE}", raw.len());
    }
    let mut reply = [0u8; FRAME_SIZE];
    let n = raw.len().min(FRAME_SIZE);
    reply[..n].copy_from_slice(&raw[..n]);
    log::trace!("frame {:02X?} -> {:02X?}", &request[..payload.len().max(1)], &reply[..8]);
    Ok(reply)
}

/// Send a single opcode and decode the string reply (serial, model).
pub fn query_string<H: UsbHandle>(
    handle: &mut H,
    endpoints: Endpoints,
    opcode: u8,
    what: &str,
    timeout: Duration,
    label: &str,
) -> Result<String> {
    let reply = write_frame(handle, endpoints, &[opcode], timeout)?;
    Ok(decode_string_or_empty(&reply, what, label))
}
