//! Wire messages for the roio protocol.
//!
//! Every datagram carries exactly one message, encoded as:
//! - A 2-byte magic number ("RO") and a 1-byte version
//! - Flags, message type, result code and channel id (1 byte each)
//! - A 4-byte little-endian transaction id
//! - An 8-byte little-endian millisecond timestamp
//! - A 2-byte little-endian body length, followed by the body
//!
//! Datagrams are never split or coalesced, so there is no stream
//! reassembly here: one `decode` call per received datagram.

pub mod channel;
pub mod codec;
pub mod error;
pub mod message;

pub use channel::{validate as validate_channel, MAX_CHANNEL};
pub use codec::{decode, encode, HEADER_SIZE, MAGIC, MAX_BODY_SIZE, VERSION};
pub use error::{Result, WireError};
pub use message::{next_transaction_id, now_millis, Message, MsgType, ResultCode};
