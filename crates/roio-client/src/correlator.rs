//! Request/response correlation.
//!
//! Each exchange runs while holding the session's request lock, so at most
//! one request is waiting on the response queue at any time. A response
//! that does not match the request in flight is logged and dropped, never
//! requeued.
//!
//! Throughput ceiling: one exchange per response budget. A client that
//! needs concurrent requests would correlate through a map of per-request
//! waiters keyed by transaction id instead of one shared queue.

use bytes::Bytes;
use roio_wire::{Message, MsgType, ResultCode};
use tracing::{debug, info, warn};

use crate::session::{RequestState, Session};

/// Subscribe (or unsubscribe) `channel` and wait for the agent's verdict.
///
/// Bookkeeping is optimistic: the channel is tracked (or forgotten) as soon
/// as the request is sent, whatever the agent answers. A failed subscribe
/// therefore stays tracked and keepalive keeps retrying it.
pub fn subscribe(session: &Session, channel: u8, unsubscribe: bool) -> bool {
    let mut state = session.lock_request();
    subscribe_locked(session, &mut state, channel, unsubscribe)
}

/// Re-send a subscribe for `channel` if it is still tracked once the request
/// lock is held. Returns `None` when the channel was dropped meanwhile.
pub fn resubscribe(session: &Session, channel: u8) -> Option<bool> {
    let mut state = session.lock_request();
    if !state.subscribed.contains(&channel) {
        debug!(channel, "channel no longer tracked, skipping resubscribe");
        return None;
    }
    Some(subscribe_locked(session, &mut state, channel, false))
}

/// Publish `body` on `channel`.
///
/// In fire-and-forget mode this returns `true` once the send was attempted,
/// whatever its outcome, and leaves the liveness flag alone. Otherwise it
/// waits for a matching ACK.
pub fn publish(session: &Session, channel: u8, body: Bytes) -> bool {
    let request = Message::request(MsgType::Publish, channel).with_body(body);
    let _state = session.lock_request();
    let sent = session.send(&request, session.target());

    if session.config().pub_no_ack {
        if let Err(err) = sent {
            warn!(channel, error = %err, "fire-and-forget publish send failed");
        }
        return true;
    }

    if let Err(err) = sent {
        warn!(channel, error = %err, "publish send failed");
        session.set_agent_gone(true);
        return false;
    }

    match await_response(session, &request) {
        Some(response) => {
            session.set_agent_gone(false);
            let acked = response.result == Some(ResultCode::Ack);
            if !acked {
                info!(channel, result = ?response.result, "publish not acknowledged");
            }
            acked
        }
        None => {
            info!(channel, "publish to channel timed out");
            session.set_agent_gone(true);
            false
        }
    }
}

fn subscribe_locked(
    session: &Session,
    state: &mut RequestState,
    channel: u8,
    unsubscribe: bool,
) -> bool {
    let (msg_type, op) = if unsubscribe {
        (MsgType::Unsubscribe, "unsubscribe")
    } else {
        (MsgType::Subscribe, "subscribe")
    };
    let request = Message::request(msg_type, channel);
    let sent = session.send(&request, session.target());

    if unsubscribe {
        state.subscribed.remove(&channel);
    } else {
        state.subscribed.insert(channel);
    }

    if let Err(err) = sent {
        warn!(channel, op, error = %err, "request send failed");
        session.set_agent_gone(true);
        return false;
    }

    match await_response(session, &request) {
        Some(response) => {
            let ok = response.result == Some(ResultCode::Success);
            // A rejection counts as the agent having lost our state.
            session.set_agent_gone(!ok);
            if ok {
                info!(channel, op, "{op} to channel ok");
            } else {
                info!(channel, op, result = ?response.result, "{op} to channel failed");
            }
            ok
        }
        None => {
            info!(channel, op, "{op} to channel timed out");
            session.set_agent_gone(true);
            false
        }
    }
}

/// Pop up to `response_attempts` entries, each with a `response_wait`
/// deadline, until one matches `request`.
fn await_response(session: &Session, request: &Message) -> Option<Message> {
    let config = session.config();
    for attempt in 0..config.response_attempts {
        match session.responses().pop_timeout(config.response_wait) {
            Some((response, from)) if request.matches(&response) => {
                debug!(%from, %response, "matched response");
                return Some(response);
            }
            Some((response, from)) => {
                warn!(%from, %response, %request, "discarding unmatched response");
            }
            None => debug!(attempt, "waiting for response"),
        }
    }
    None
}
