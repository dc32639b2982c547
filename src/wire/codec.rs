//! Length-prefixed framing

use super::message::Message;
use crate::common::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the little-endian length header
pub const HEADER_LEN: usize = 4;

/// Largest datagram the multicast receiver reads
pub const MAX_DATAGRAM: usize = 1500;

/// Serialize a body without framing (TCP leg)
pub fn encode_body(msg: &Message) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Serialize and prefix with the body length (multicast leg)
pub fn encode(msg: &Message) -> Result<Bytes> {
    let body = encode_body(msg)?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::Internal(format!("body too large: {} bytes", body.len())))?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    frame.put_u32_le(len);
    frame.put_slice(&body);
    Ok(frame.freeze())
}

/// Parse an unframed body
pub fn decode_body(body: &[u8]) -> Result<Message> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedMessage(e.to_string()))
}

/// Parse a framed buffer. Bytes past the declared length are ignored.
pub fn decode(buf: &[u8]) -> Result<Message> {
    if buf.len() < HEADER_LEN {
        return Err(Error::MalformedMessage(format!(
            "truncated header: {} bytes",
            buf.len()
        )));
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&buf[..HEADER_LEN]);
    let declared = u32::from_le_bytes(header) as usize;
    let available = buf.len() - HEADER_LEN;
    if declared > available {
        return Err(Error::MalformedMessage(format!(
            "declared length {} exceeds {} available bytes",
            declared, available
        )));
    }

    decode_body(&buf[HEADER_LEN..HEADER_LEN + declared])
}
