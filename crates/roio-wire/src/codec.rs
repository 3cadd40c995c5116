use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::message::{Message, MsgType, ResultCode};

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 22;

/// Magic bytes: "RO" (0x52 0x4F).
pub const MAGIC: [u8; 2] = [0x52, 0x4F];

/// Protocol version written by this codec.
pub const VERSION: u8 = 1;

/// Largest body that still fits one IPv4 UDP datagram with the header.
pub const MAX_BODY_SIZE: usize = 65_507 - HEADER_SIZE;

const FLAG_REQUEST: u8 = 0x01;
const RESULT_NONE: u8 = 0;

/// Encode a message into a single datagram.
///
/// Wire format:
/// ```text
/// ┌────────┬─────┬───────┬──────┬────────┬─────────┬──────┬──────────┬───────────┬─────────┬──────┐
/// │ "RO"   │ ver │ flags │ type │ result │ channel │ rsvd │ tid      │ ts (ms)   │ len     │ body │
/// │ 2B     │ 1B  │ 1B    │ 1B   │ 1B     │ 1B      │ 1B   │ 4B LE    │ 8B LE     │ 2B LE   │ len  │
/// └────────┴─────┴───────┴──────┴────────┴─────────┴──────┴──────────┴───────────┴─────────┴──────┘
/// ```
pub fn encode(msg: &Message) -> Result<Bytes> {
    if msg.body.len() > MAX_BODY_SIZE {
        return Err(WireError::BodyTooLarge {
            size: msg.body.len(),
            max: MAX_BODY_SIZE,
        });
    }

    let mut dst = BytesMut::with_capacity(HEADER_SIZE + msg.body.len());
    dst.put_slice(&MAGIC);
    dst.put_u8(VERSION);
    dst.put_u8(if msg.is_request { FLAG_REQUEST } else { 0 });
    dst.put_u8(msg.msg_type.as_u8());
    dst.put_u8(msg.result.map(ResultCode::as_u8).unwrap_or(RESULT_NONE));
    dst.put_u8(msg.channel_id);
    dst.put_u8(0);
    dst.put_u32_le(msg.transaction_id);
    dst.put_u64_le(msg.timestamp_ms);
    dst.put_u16_le(msg.body.len() as u16);
    dst.put_slice(&msg.body);
    Ok(dst.freeze())
}

/// Decode one datagram.
///
/// The datagram must contain exactly one message: trailing bytes beyond the
/// declared body length are rejected.
pub fn decode(datagram: &[u8]) -> Result<Message> {
    if datagram.len() < HEADER_SIZE {
        return Err(WireError::Truncated {
            len: datagram.len(),
            needed: HEADER_SIZE,
        });
    }

    let mut src = datagram;
    if src[0..2] != MAGIC {
        return Err(WireError::InvalidMagic);
    }
    src.advance(2);

    let version = src.get_u8();
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }

    let flags = src.get_u8();
    if flags & !FLAG_REQUEST != 0 {
        return Err(WireError::InvalidFlags(flags));
    }

    let raw_type = src.get_u8();
    let msg_type = MsgType::from_u8(raw_type).ok_or(WireError::UnknownMessageType(raw_type))?;

    let raw_result = src.get_u8();
    let result = match raw_result {
        RESULT_NONE => None,
        other => Some(ResultCode::from_u8(other).ok_or(WireError::UnknownResultCode(other))?),
    };

    let channel_id = src.get_u8();
    let _reserved = src.get_u8();
    let transaction_id = src.get_u32_le();
    let timestamp_ms = src.get_u64_le();
    let declared = src.get_u16_le() as usize;

    if src.remaining() != declared {
        return Err(WireError::BodyLengthMismatch {
            declared,
            actual: src.remaining(),
        });
    }

    Ok(Message {
        is_request: flags & FLAG_REQUEST != 0,
        msg_type,
        transaction_id,
        channel_id,
        result,
        timestamp_ms,
        body: Bytes::copy_from_slice(src),
    })
}
