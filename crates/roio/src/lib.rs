//! Pub/sub client for roio agents over UDP.
//!
//! A client subscribes to numbered channels on an agent, publishes to them,
//! and receives what others publish, over plain datagrams with a small
//! timeout/retry and liveness policy on top.
//!
//! # Crate Structure
//!
//! - [`transport`]: Datagram transport abstraction (UDP)
//! - [`wire`]: Message type and binary codec
//! - [`client`]: Correlation, keepalive and delivery engine

/// Re-export transport types.
pub mod transport {
    pub use roio_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use roio_wire::*;
}

/// Re-export client types.
pub mod client {
    pub use roio_client::*;
}

pub use roio_client::{Client, ClientConfig, ClientError, ClientState};
