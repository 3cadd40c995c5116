//! Toy agent for local experiments: tracks subscriptions, acks publishes and
//! forwards them to every subscriber of the channel.
//!
//! Run with:
//!   cargo run --example fake-agent -- 127.0.0.1:3333
//!
//! Then in two other terminals:
//!   cargo run --features cli -- chat --channel 5

use std::collections::{BTreeMap, BTreeSet};
use std::net::{SocketAddr, UdpSocket};

use roio::transport::UdpTransport;
use roio::wire::{Message, MsgType, ResultCode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:3333".to_string());
    let socket = UdpSocket::bind(&bind)?;
    eprintln!("Agent listening on {}", socket.local_addr()?);

    let mut subscribers: BTreeMap<u8, BTreeSet<SocketAddr>> = BTreeMap::new();
    let mut buf = vec![0u8; UdpTransport::MAX_DATAGRAM_SIZE];

    loop {
        let (len, from) = socket.recv_from(&mut buf)?;
        let msg = match roio::wire::decode(&buf[..len]) {
            Ok(msg) => msg,
            Err(e) => {
                eprintln!("Dropping {len} bytes from {from}: {e}");
                continue;
            }
        };
        eprintln!("{from} -> {msg}");
        if !msg.is_request {
            continue;
        }

        let result = match msg.msg_type {
            MsgType::Subscribe => {
                subscribers.entry(msg.channel_id).or_default().insert(from);
                ResultCode::Success
            }
            MsgType::Unsubscribe => {
                if let Some(set) = subscribers.get_mut(&msg.channel_id) {
                    set.remove(&from);
                }
                ResultCode::Success
            }
            MsgType::Publish => {
                let forward = Message::request(MsgType::Publish, msg.channel_id)
                    .with_body(msg.body.clone());
                let wire = roio::wire::encode(&forward)?;
                for peer in subscribers.get(&msg.channel_id).into_iter().flatten() {
                    if *peer != from {
                        socket.send_to(&wire, peer)?;
                    }
                }
                ResultCode::Ack
            }
            MsgType::Gone => continue,
        };

        let reply = roio::wire::encode(&Message::response_to(&msg, result))?;
        socket.send_to(&reply, from)?;
    }
}
