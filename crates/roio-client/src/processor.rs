//! Delivery processor.
//!
//! Drains the delivery queue and calls the user callback on this thread.
//! A slow callback delays every later delivery; callers that need
//! concurrency must hand work off inside the callback.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use roio_wire::Message;
use tracing::{error, info};

use crate::session::Session;

/// Processor loop. Returns once `running` is cleared.
pub fn run(session: &Session, running: &AtomicBool) {
    info!("processor started");
    let wait = session.config().delivery_wait;

    while running.load(Ordering::Acquire) {
        if let Some(msg) = session.deliveries().pop_timeout(wait) {
            deliver(session, &msg);
        }
    }

    info!("processor stopped");
}

/// Invoke the current callback for `msg`. A panicking callback is logged and
/// reported as `false`; the processor keeps running.
pub fn deliver(session: &Session, msg: &Message) -> bool {
    let callback = session.callback();
    match panic::catch_unwind(AssertUnwindSafe(|| callback(msg))) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                channel = msg.channel_id,
                tid = msg.transaction_id,
                panic = panic_message(payload.as_ref()),
                "delivery callback panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
