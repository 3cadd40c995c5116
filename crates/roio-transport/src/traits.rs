use std::net::SocketAddr;

use crate::error::Result;

/// A connectionless datagram endpoint shared between threads.
///
/// All methods take `&self`: the receiver thread blocks in [`recv_from`]
/// while other threads send through the same endpoint.
///
/// [`recv_from`]: DatagramTransport::recv_from
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram to `addr`, returning the number of bytes written.
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize>;

    /// Receive one datagram into `buf`.
    ///
    /// Returns `Ok(None)` when the receive timeout elapses without data, so
    /// callers can check their stop flag and loop again.
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;

    /// Local address the endpoint is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Release the endpoint. Subsequent sends and receives fail with
    /// [`TransportError::Shutdown`](crate::TransportError::Shutdown).
    fn close(&self);

    /// Whether [`close`](DatagramTransport::close) has been called.
    fn is_closed(&self) -> bool;
}
