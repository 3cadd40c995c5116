use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DatagramTransport;

/// UDP transport.
///
/// Wraps a bound [`UdpSocket`] with a receive timeout so the receiver thread
/// wakes up periodically even when the agent is silent. [`close`] drops the
/// socket, releasing the port; a receive in flight finishes within one
/// timeout first.
///
/// [`close`]: DatagramTransport::close
pub struct UdpTransport {
    socket: RwLock<Option<UdpSocket>>,
}

impl UdpTransport {
    /// Largest payload a single UDP datagram can carry over IPv4.
    pub const MAX_DATAGRAM_SIZE: usize = 65_507;

    /// Bind a UDP socket on `addr` with the given receive timeout.
    ///
    /// Use port 0 to let the OS pick an ephemeral port.
    pub fn bind(addr: SocketAddr, recv_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        // A zero timeout would turn into "block forever" in std; clamp it.
        let timeout = recv_timeout.max(Duration::from_millis(1));
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|source| TransportError::Bind { addr, source })?;

        let local = socket.local_addr()?;
        info!(%local, ?timeout, "udp transport bound");

        Ok(Self {
            socket: RwLock::new(Some(socket)),
        })
    }

    fn read_socket(&self) -> RwLockReadGuard<'_, Option<UdpSocket>> {
        self.socket.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_socket<T>(&self, op: impl FnOnce(&UdpSocket) -> Result<T>) -> Result<T> {
        match self.read_socket().as_ref() {
            Some(socket) => op(socket),
            None => Err(TransportError::Shutdown),
        }
    }
}

impl DatagramTransport for UdpTransport {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        self.with_socket(|socket| loop {
            match socket.send_to(buf, addr) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(TransportError::Send { addr, source }),
            }
        })
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        self.with_socket(|socket| match socket.recv_from(buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            // ICMP port-unreachable from an earlier send surfaces here on some
            // platforms; it says nothing about the next datagram.
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                ) =>
            {
                debug!(error = %err, "ignoring icmp error on receive");
                Ok(None)
            }
            Err(err) => Err(TransportError::Io(err)),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.with_socket(|socket| Ok(socket.local_addr()?))
    }

    fn close(&self) {
        let socket = self
            .socket
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(socket) = socket {
            debug!(local = ?socket.local_addr().ok(), "udp transport closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.read_socket().is_none()
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let local = self.read_socket().as_ref().and_then(|s| s.local_addr().ok());
        f.debug_struct("UdpTransport")
            .field("local", &local)
            .field("closed", &local.is_none())
            .finish()
    }
}

/// Resolve `host:port` to the first matching socket address, preferring IPv4.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let target = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|err| TransportError::Resolve {
            target: target.clone(),
            reason: err.to_string(),
        })?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or(TransportError::Resolve {
            target,
            reason: "no addresses found".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::Instant;

    fn loopback() -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
    }

    #[test]
    fn test_send_and_receive_loopback() {
        let a = UdpTransport::bind(loopback(), Duration::from_secs(1)).unwrap();
        let b = UdpTransport::bind(loopback(), Duration::from_secs(1)).unwrap();

        let b_addr = b.local_addr().unwrap();
        a.send_to(b"hello", b_addr).unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = b.recv_from(&mut buf).unwrap().expect("datagram expected");
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn test_receive_timeout_returns_none() {
        let t = UdpTransport::bind(loopback(), Duration::from_millis(50)).unwrap();
        let mut buf = [0u8; 16];
        let start = Instant::now();
        let result = t.recv_from(&mut buf).unwrap();
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let t = UdpTransport::bind(loopback(), Duration::from_millis(50)).unwrap();
        let peer = t.local_addr().unwrap();
        t.close();
        assert!(t.is_closed());
        assert!(matches!(
            t.send_to(b"x", peer),
            Err(TransportError::Shutdown)
        ));
        let mut buf = [0u8; 4];
        assert!(matches!(t.recv_from(&mut buf), Err(TransportError::Shutdown)));
    }

    #[test]
    fn test_close_releases_port() {
        let t = UdpTransport::bind(loopback(), Duration::from_millis(50)).unwrap();
        let local = t.local_addr().unwrap();
        t.close();
        t.close();
        assert!(matches!(t.local_addr(), Err(TransportError::Shutdown)));
        let rebound = UdpSocket::bind(local).expect("port should be free after close");
        assert_eq!(rebound.local_addr().unwrap(), local);
    }

    #[test]
    fn test_bind_conflict_reports_address() {
        let first = UdpTransport::bind(loopback(), Duration::from_millis(50)).unwrap();
        let taken = first.local_addr().unwrap();
        let result = UdpTransport::bind(taken, Duration::from_millis(50));
        assert!(matches!(result, Err(TransportError::Bind { addr, .. }) if addr == taken));
    }

    #[test]
    fn test_resolve_prefers_ipv4() {
        let addr = resolve("localhost", 3333).unwrap();
        assert_eq!(addr.port(), 3333);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_resolve_literal_address() {
        let addr = resolve("127.0.0.1", 4000).unwrap();
        assert_eq!(addr, "127.0.0.1:4000".parse().unwrap());
    }
}
