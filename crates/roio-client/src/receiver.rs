//! Inbound classifier.
//!
//! Receives datagrams until stopped and routes each decoded message to the
//! response queue, the delivery queue, or the liveness flag. Nothing here
//! ever blocks on a queue, and no error escapes the loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use roio_transport::{TransportError, UdpTransport};
use roio_wire::{Message, MsgType, ResultCode};
use tracing::{debug, info, warn};

use crate::session::Session;

const ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Where an inbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A response; queue it for the correlator.
    Response,
    /// A publish ack nobody waits for (fire-and-forget mode).
    DropPublishAck,
    /// A publish addressed to us; deliver and acknowledge.
    Deliver,
    /// The agent announced its shutdown.
    AgentGone,
    /// A request shape the client does not serve.
    Unexpected,
}

/// Decide the route for `msg`.
pub fn classify(msg: &Message, pub_no_ack: bool) -> Route {
    match (msg.is_request, msg.msg_type) {
        (false, MsgType::Publish) if pub_no_ack => Route::DropPublishAck,
        (false, _) => Route::Response,
        (true, MsgType::Publish) => Route::Deliver,
        (true, MsgType::Gone) => Route::AgentGone,
        (true, _) => Route::Unexpected,
    }
}

/// Receiver loop. Returns once `running` is cleared or the transport closes.
pub fn run(session: &Session, running: &AtomicBool) {
    info!("receiver started");
    let mut buf = vec![0u8; UdpTransport::MAX_DATAGRAM_SIZE];

    while running.load(Ordering::Acquire) {
        match session.transport().recv_from(&mut buf) {
            Ok(Some((len, from))) => handle_datagram(session, &buf[..len], from),
            Ok(None) => continue,
            Err(TransportError::Shutdown) => break,
            Err(err) => {
                warn!(error = %err, "receive failed");
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    info!("receiver stopped");
}

/// Decode and dispatch one datagram.
pub fn handle_datagram(session: &Session, datagram: &[u8], from: SocketAddr) {
    debug!(%from, len = datagram.len(), "datagram received");

    let msg = match roio_wire::decode(datagram) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%from, error = %err, len = datagram.len(), "discarding undecodable datagram");
            return;
        }
    };

    dispatch(session, msg, from);
}

/// Apply the route for an already decoded message.
pub fn dispatch(session: &Session, msg: Message, from: SocketAddr) {
    match classify(&msg, session.config().pub_no_ack) {
        Route::Response => {
            debug!(%from, %msg, "queueing response");
            if let Some((old, _)) = session.responses().push((msg, from)) {
                warn!(discarded = %old, "response queue full, discarded oldest");
            }
        }
        Route::DropPublishAck => {
            debug!(%from, %msg, "dropping publish ack");
        }
        Route::Deliver => {
            let ack_target = msg.clone();
            if let Some(old) = session.deliveries().push(msg) {
                warn!(discarded = %old, "delivery queue full, discarded oldest");
            }
            if let Err(err) = session.respond(from, &ack_target, ResultCode::Ack, Bytes::new()) {
                warn!(%from, error = %err, "failed to acknowledge publish");
            }
        }
        Route::AgentGone => {
            warn!(%from, "agent is gone");
            session.set_agent_gone(true);
        }
        Route::Unexpected => {
            warn!(%from, %msg, "unexpected message");
        }
    }
}
