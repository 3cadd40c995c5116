//! Datagram transport abstraction.
//!
//! This is the lowest layer of roio. The client engine talks to the agent
//! exclusively through [`DatagramTransport`], which keeps socket handling out
//! of the correlation logic and lets tests substitute their own transport.

pub mod error;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use traits::DatagramTransport;
pub use udp::UdpTransport;
