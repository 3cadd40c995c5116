//! Subscribe to a few channels and print what arrives for ten seconds.
//!
//! Run with:
//!   ROIO_PORT=3333 cargo run --example subscriber

use std::thread;
use std::time::Duration;

use roio::{Client, ClientConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new(ClientConfig::from_env()?)?;
    client.set_callback(|msg| {
        println!("[ch {}] {}", msg.channel_id, msg.body_preview());
    });
    client.start()?;

    for channel in [1u16, 2, 3] {
        let confirmed = client.subscribe(channel)?;
        eprintln!("subscribe {channel}: {}", if confirmed { "ok" } else { "pending" });
    }

    thread::sleep(Duration::from_secs(10));
    eprintln!("agent gone: {}", client.is_agent_gone());
    client.stop();
    Ok(())
}
