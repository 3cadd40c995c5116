//! Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use roio_transport::{DatagramTransport, Result, TransportError};
use roio_wire::Message;

use crate::config::ClientConfig;
use crate::session::Session;

/// Address the scripted agent answers from.
pub const AGENT: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::LOCALHOST,
    3333,
));

type Responder = Box<dyn Fn(&Message) -> Vec<Message> + Send + Sync>;

/// In-memory transport acting as the agent.
///
/// Every sent datagram is decoded and recorded; the responder decides which
/// messages the "agent" sends back, and those come out of `recv_from`.
pub struct ScriptedTransport {
    responder: Responder,
    sent: Mutex<Vec<(Message, SocketAddr)>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    closed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&Message) -> Vec<Message> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a message as if the agent had sent it unprompted.
    pub fn inject(&self, msg: &Message) {
        let wire = roio_wire::encode(msg).expect("test message should encode");
        self.inbound.lock().unwrap().push_back(wire.to_vec());
    }

    /// Queue raw bytes as an inbound datagram.
    pub fn inject_raw(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().push_back(bytes.to_vec());
    }

    pub fn sent(&self) -> Vec<(Message, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl DatagramTransport for ScriptedTransport {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        let msg = roio_wire::decode(buf).expect("client should send valid datagrams");
        for reply in (self.responder)(&msg) {
            self.inject(&reply);
        }
        self.sent.lock().unwrap().push((msg, addr));
        Ok(buf.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        let next = self.inbound.lock().unwrap().pop_front();
        match next {
            Some(bytes) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(Some((bytes.len(), AGENT)))
            }
            None => {
                thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok("127.0.0.1:40000".parse().unwrap())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Timing tightened so timeout paths finish quickly in tests.
pub fn fast_config() -> ClientConfig {
    ClientConfig::default()
        .with_response_wait(Duration::from_millis(50), 2)
        .with_recv_timeout(Duration::from_millis(20))
}

/// Session wired to a scripted agent.
pub fn scripted_session(
    config: ClientConfig,
    responder: impl Fn(&Message) -> Vec<Message> + Send + Sync + 'static,
) -> (Arc<Session>, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(responder));
    let session = Arc::new(Session::new(
        config,
        Arc::clone(&transport) as Arc<dyn DatagramTransport>,
    ));
    (session, transport)
}
