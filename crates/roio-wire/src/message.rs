use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Message type carried in every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Subscribe,
    Unsubscribe,
    Publish,
    /// Sent by the agent when it shuts down.
    Gone,
}

impl MsgType {
    pub fn as_u8(self) -> u8 {
        match self {
            MsgType::Subscribe => 1,
            MsgType::Unsubscribe => 2,
            MsgType::Publish => 3,
            MsgType::Gone => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MsgType::Subscribe),
            2 => Some(MsgType::Unsubscribe),
            3 => Some(MsgType::Publish),
            4 => Some(MsgType::Gone),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MsgType::Subscribe => "SUBSCRIBE",
            MsgType::Unsubscribe => "UNSUBSCRIBE",
            MsgType::Publish => "PUBLISH",
            MsgType::Gone => "GONE",
        }
    }
}

/// Result code carried by responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ack,
    Success,
    Failure,
}

impl ResultCode {
    pub fn as_u8(self) -> u8 {
        match self {
            ResultCode::Ack => 1,
            ResultCode::Success => 2,
            ResultCode::Failure => 3,
        }
    }

    /// `0` means "no result" and is handled by the codec, not here.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ResultCode::Ack),
            2 => Some(ResultCode::Success),
            3 => Some(ResultCode::Failure),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Ack => "ACK",
            ResultCode::Success => "SUCCESS",
            ResultCode::Failure => "FAILURE",
        }
    }
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// `true` for subscribe/unsubscribe/publish requests and GONE notices.
    pub is_request: bool,
    pub msg_type: MsgType,
    /// Correlates a response with the request that caused it.
    pub transaction_id: u32,
    pub channel_id: u8,
    /// Present on responses only.
    pub result: Option<ResultCode>,
    /// Milliseconds since the Unix epoch at creation time.
    pub timestamp_ms: u64,
    pub body: Bytes,
}

impl Message {
    /// Create a request with a fresh transaction id and the current time.
    pub fn request(msg_type: MsgType, channel_id: u8) -> Self {
        Self {
            is_request: true,
            msg_type,
            transaction_id: next_transaction_id(),
            channel_id,
            result: None,
            timestamp_ms: now_millis(),
            body: Bytes::new(),
        }
    }

    /// Create the response to `request`, echoing its transaction id, type
    /// and channel.
    pub fn response_to(request: &Message, result: ResultCode) -> Self {
        Self {
            is_request: false,
            msg_type: request.msg_type,
            transaction_id: request.transaction_id,
            channel_id: request.channel_id,
            result: Some(result),
            timestamp_ms: now_millis(),
            body: Bytes::new(),
        }
    }

    /// Attach a payload.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether `response` answers this request: same transaction id,
    /// message type and channel.
    pub fn matches(&self, response: &Message) -> bool {
        self.transaction_id == response.transaction_id
            && self.msg_type == response.msg_type
            && self.channel_id == response.channel_id
    }

    /// Body as UTF-8 text, or a short binary placeholder.
    pub fn body_preview(&self) -> String {
        match std::str::from_utf8(&self.body) {
            Ok(text) => text.to_string(),
            Err(_) => format!("<binary {} bytes>", self.body.len()),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} tid={} ch={}",
            self.msg_type.name(),
            if self.is_request { "" } else { "_RSP" },
            self.transaction_id,
            self.channel_id
        )?;
        if let Some(result) = self.result {
            write!(f, " result={}", result.name())?;
        }
        write!(f, " ts={} body={}B", self.timestamp_ms, self.body.len())
    }
}

/// Next transaction id.
///
/// Ids come from one process-wide counter seeded from the clock, so two
/// client processes started back to back are unlikely to reuse each
/// other's ids against the same agent.
pub fn next_transaction_id() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER
        .get_or_init(|| {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32).rotate_left(16))
                .unwrap_or(1);
            AtomicU32::new(seed)
        })
        .fetch_add(1, Ordering::Relaxed)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
