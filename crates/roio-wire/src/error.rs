/// Errors that can occur while encoding or decoding a wire message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The datagram is shorter than the fixed header.
    #[error("datagram truncated ({len} bytes, header needs {needed})")]
    Truncated { len: usize, needed: usize },

    /// The datagram does not start with the protocol magic.
    #[error("invalid magic (expected 0x524f \"RO\")")]
    InvalidMagic,

    /// The datagram uses a protocol version this codec does not speak.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Reserved flag bits are set.
    #[error("invalid flags 0x{0:02x}")]
    InvalidFlags(u8),

    /// The message type byte is not a known type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The result code byte is not a known result.
    #[error("unknown result code {0}")]
    UnknownResultCode(u8),

    /// The declared body length disagrees with the datagram size.
    #[error("body length mismatch (declared {declared}, actual {actual})")]
    BodyLengthMismatch { declared: usize, actual: usize },

    /// The body does not fit into a single datagram.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
