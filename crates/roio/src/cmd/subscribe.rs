use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::cmd::{check_channel, install_ctrlc_handler, AgentArgs, SubscribeArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_delivery, OutputFormat};

const POLL: Duration = Duration::from_millis(50);

pub fn run(args: SubscribeArgs, agent: &AgentArgs, format: OutputFormat) -> CliResult<i32> {
    for &channel in &args.channels {
        check_channel(channel)?;
    }
    let running = install_ctrlc_handler()?;

    let client = agent.start_client()?;
    let printed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&printed);
    let limit = args.count;
    client.set_callback(move |msg| {
        // Claim a slot first so the processor never prints past --count.
        let seen = counter.fetch_add(1, Ordering::SeqCst);
        if limit.is_none_or(|limit| seen < limit) {
            print_delivery(msg, format);
        }
    });

    for &channel in &args.channels {
        match client.subscribe(channel) {
            Ok(true) => info!(channel, "subscribed"),
            Ok(false) => warn!(channel, "subscribe not confirmed, keepalive will retry"),
            Err(err) => {
                client.stop();
                return Err(client_error("subscribe failed", err));
            }
        }
    }

    while running.load(Ordering::SeqCst) && !reached(&printed, limit) {
        thread::sleep(POLL);
    }

    client.stop();
    Ok(SUCCESS)
}

fn reached(printed: &AtomicUsize, limit: Option<usize>) -> bool {
    limit.is_some_and(|limit| printed.load(Ordering::SeqCst) >= limit)
}
