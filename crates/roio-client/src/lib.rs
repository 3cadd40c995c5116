//! Client correlation and liveness engine.
//!
//! This is the layer applications use. A [`Client`] subscribes to channels
//! on a remote agent, publishes messages, and hands inbound publishes to a
//! user callback, over an unreliable datagram transport.
//!
//! Three worker threads run while the client is started:
//! - `roio-msgloop` receives and classifies datagrams ([`receiver`])
//! - `roio-keepalive` re-subscribes tracked channels ([`keepalive`])
//! - `roio-processor` invokes the delivery callback ([`processor`])
//!
//! Outbound requests are serialized by one lock ([`correlator`]): at most
//! one request/response exchange is in flight at a time.

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod keepalive;
pub mod processor;
pub mod queue;
pub mod receiver;
pub mod session;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Client, ClientState};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use queue::BoundedQueue;
pub use session::DeliveryCallback;

pub use roio_wire::{Message, MsgType, ResultCode};
