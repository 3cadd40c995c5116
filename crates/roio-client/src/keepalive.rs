//! Keepalive: periodic re-subscription.
//!
//! The agent forgets subscriptions when it restarts. While it looks alive
//! the loop resubscribes every tracked channel on a slow heartbeat; once it
//! looks gone (GONE notice, timeout, or rejection) the interval drops so
//! subscriptions come back quickly after the restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::correlator;
use crate::session::Session;

/// Keepalive loop. Returns once `running` is cleared.
pub fn run(session: &Session, running: &AtomicBool) {
    info!("keepalive started");
    let mut last = Instant::now();

    while running.load(Ordering::Acquire) {
        if last.elapsed() >= session.keepalive_interval() {
            last = Instant::now();
            sweep(session, running);
        }
        thread::sleep(session.config().keepalive_tick);
    }

    info!("keepalive stopped");
}

/// Resubscribe every tracked channel once. Returns how many requests were
/// sent.
pub fn sweep(session: &Session, running: &AtomicBool) -> usize {
    let channels = session.subscribed_snapshot();
    if channels.is_empty() {
        return 0;
    }
    debug!(?channels, gone = session.is_agent_gone(), "resubscribing");

    let mut sent = 0;
    for channel in channels {
        if !running.load(Ordering::Acquire) {
            break;
        }
        if correlator::resubscribe(session, channel).is_some() {
            sent += 1;
        }
    }
    sent
}
