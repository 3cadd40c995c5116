//! State shared between the facade and the worker threads.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use roio_transport::DatagramTransport;
use roio_wire::{Message, ResultCode};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::queue::BoundedQueue;

/// Callback invoked for every publish delivered to this client.
pub type DeliveryCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// State guarded by the request lock.
///
/// Holding the guard is what serializes outbound exchanges, and every write
/// to the subscription set goes through it.
#[derive(Debug, Default)]
pub struct RequestState {
    /// Channels the client believes it is subscribed to.
    pub subscribed: BTreeSet<u8>,
}

/// Session shared by the client facade and its worker threads.
pub struct Session {
    transport: Arc<dyn DatagramTransport>,
    config: ClientConfig,
    // Only steers keepalive cadence; stale reads are harmless.
    agent_gone: AtomicBool,
    request: Mutex<RequestState>,
    responses: BoundedQueue<(Message, SocketAddr)>,
    deliveries: BoundedQueue<Message>,
    callback: RwLock<DeliveryCallback>,
}

impl Session {
    pub fn new(config: ClientConfig, transport: Arc<dyn DatagramTransport>) -> Self {
        Self {
            responses: BoundedQueue::new(config.queue_capacity),
            deliveries: BoundedQueue::new(config.queue_capacity),
            transport,
            config,
            agent_gone: AtomicBool::new(false),
            request: Mutex::new(RequestState::default()),
            callback: RwLock::new(Arc::new(log_delivery)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn target(&self) -> SocketAddr {
        self.config.target
    }

    pub fn transport(&self) -> &Arc<dyn DatagramTransport> {
        &self.transport
    }

    pub fn responses(&self) -> &BoundedQueue<(Message, SocketAddr)> {
        &self.responses
    }

    pub fn deliveries(&self) -> &BoundedQueue<Message> {
        &self.deliveries
    }

    pub fn is_agent_gone(&self) -> bool {
        self.agent_gone.load(Ordering::Relaxed)
    }

    pub fn set_agent_gone(&self, gone: bool) {
        self.agent_gone.store(gone, Ordering::Relaxed);
    }

    /// Resubscribe interval for the current liveness belief.
    pub fn keepalive_interval(&self) -> Duration {
        if self.is_agent_gone() {
            self.config.keepalive_gone
        } else {
            self.config.keepalive_alive
        }
    }

    /// Acquire the request lock.
    pub fn lock_request(&self) -> MutexGuard<'_, RequestState> {
        self.request.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the tracked channels, in ascending order.
    pub fn subscribed_snapshot(&self) -> Vec<u8> {
        self.lock_request().subscribed.iter().copied().collect()
    }

    pub fn callback(&self) -> DeliveryCallback {
        Arc::clone(&self.callback.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_callback(&self, callback: DeliveryCallback) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Encode and send `msg` to `addr`.
    pub fn send(&self, msg: &Message, addr: SocketAddr) -> Result<()> {
        let wire = roio_wire::encode(msg)?;
        debug!(%addr, %msg, "send");
        self.transport.send_to(&wire, addr)?;
        Ok(())
    }

    /// Answer `request` from `to`.
    ///
    /// The response goes to the configured agent address and to the observed
    /// source address, so it arrives even when the agent replies from an
    /// address other than the one we target (NAT, multi-homed hosts).
    pub fn respond(
        &self,
        to: SocketAddr,
        request: &Message,
        result: ResultCode,
        body: bytes::Bytes,
    ) -> Result<()> {
        let response = Message::response_to(request, result).with_body(body);
        let wire = roio_wire::encode(&response)?;
        debug!(%to, %response, "respond");
        self.transport.send_to(&wire, self.config.target)?;
        self.transport.send_to(&wire, to)?;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.config.target)
            .field("agent_gone", &self.is_agent_gone())
            .field("responses", &self.responses)
            .field("deliveries", &self.deliveries)
            .finish()
    }
}

/// Default delivery callback: log the message.
fn log_delivery(msg: &Message) {
    info!(
        channel = msg.channel_id,
        body = %msg.body_preview(),
        "received publish"
    );
}
