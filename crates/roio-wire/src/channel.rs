//! Channel ids.
//!
//! Channels are numbered 0-255 and carried as a single byte on the wire.
//! Callers hand us wider integers, so range checking happens here, before
//! anything touches the network.

/// Highest valid channel id.
pub const MAX_CHANNEL: u16 = u8::MAX as u16;

/// Returns the wire channel id, or `None` if `channel` is outside 0-255.
pub fn validate(channel: u16) -> Option<u8> {
    u8::try_from(channel).ok()
}
