use crate::client::ClientState;

/// Errors surfaced by the client facade.
///
/// Protocol outcomes (timeouts, rejected subscriptions, missing acks) are
/// not errors: the request operations report them as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Channel id outside 0-255. Rejected before any datagram is sent.
    #[error("channel {0} out of range [0, 255]")]
    InvalidChannel(u16),

    /// The lifecycle operation is not allowed in the current state.
    #[error("cannot {op} client in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: ClientState,
    },

    /// Invalid configuration (environment or explicit).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] roio_transport::TransportError),

    /// Message could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] roio_wire::WireError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
