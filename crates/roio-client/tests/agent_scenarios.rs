use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use roio_client::{Client, ClientConfig, ClientError, Message, MsgType, ResultCode};

type Policy = Box<dyn Fn(&Message) -> Option<ResultCode> + Send + Sync>;

/// Agent stand-in on a real loopback socket.
///
/// Records every datagram the client sends and answers requests according
/// to `policy` (`None` means stay silent).
struct FakeAgent {
    addr: SocketAddr,
    socket: UdpSocket,
    received: Arc<Mutex<Vec<(Message, SocketAddr)>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeAgent {
    fn start(policy: impl Fn(&Message) -> Option<ResultCode> + Send + Sync + 'static) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("agent socket should bind");
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .expect("read timeout should set");
        let addr = socket.local_addr().expect("agent should have an address");

        let received = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));
        let policy: Policy = Box::new(policy);

        let loop_socket = socket.try_clone().expect("agent socket should clone");
        let loop_received = Arc::clone(&received);
        let loop_running = Arc::clone(&running);
        let handle = thread::spawn(move || {
            let mut buf = vec![0u8; 65_535];
            while loop_running.load(Ordering::SeqCst) {
                let Ok((len, from)) = loop_socket.recv_from(&mut buf) else {
                    continue;
                };
                let Ok(msg) = roio_wire::decode(&buf[..len]) else {
                    continue;
                };
                // Record before replying: the client returns as soon as the
                // reply lands, and tests inspect `received` right after.
                loop_received.lock().unwrap().push((msg.clone(), from));
                if msg.is_request {
                    if let Some(result) = policy(&msg) {
                        let reply = roio_wire::encode(&Message::response_to(&msg, result))
                            .expect("reply should encode");
                        let _ = loop_socket.send_to(&reply, from);
                    }
                }
            }
        });

        Self {
            addr,
            socket,
            received,
            running,
            handle: Some(handle),
        }
    }

    fn answering() -> Self {
        Self::start(|msg| match msg.msg_type {
            MsgType::Publish => Some(ResultCode::Ack),
            _ => Some(ResultCode::Success),
        })
    }

    fn silent() -> Self {
        Self::start(|_| None)
    }

    fn send(&self, msg: &Message, to: SocketAddr) {
        let wire = roio_wire::encode(msg).expect("agent message should encode");
        self.socket
            .send_to(&wire, to)
            .expect("agent send should succeed");
    }

    fn received(&self) -> Vec<(Message, SocketAddr)> {
        self.received.lock().unwrap().clone()
    }

    fn requests(&self, msg_type: MsgType) -> Vec<Message> {
        self.received()
            .into_iter()
            .filter(|(msg, _)| msg.is_request && msg.msg_type == msg_type)
            .map(|(msg, _)| msg)
            .collect()
    }

    fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(&[(Message, SocketAddr)]) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.received()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn config_for(agent: &FakeAgent) -> ClientConfig {
    ClientConfig::default()
        .with_target(agent.addr)
        .with_bind("127.0.0.1:0".parse().unwrap())
        .with_recv_timeout(Duration::from_millis(50))
        .with_response_wait(Duration::from_millis(100), 2)
}

fn started(config: ClientConfig) -> Client {
    let client = Client::new(config).expect("client should bind");
    client.start().expect("client should start");
    client
}

#[test]
fn invalid_channel_never_reaches_the_agent() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));

    assert!(matches!(
        client.subscribe(256),
        Err(ClientError::InvalidChannel(256))
    ));
    assert!(matches!(
        client.publish(1000, "x"),
        Err(ClientError::InvalidChannel(1000))
    ));

    thread::sleep(Duration::from_millis(100));
    assert!(agent.received().is_empty());
    client.stop();
}

#[test]
fn subscribe_then_unsubscribe_leaves_nothing_tracked() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));

    assert!(client.subscribe(5).unwrap());
    assert_eq!(client.subscribed_channels(), vec![5]);
    assert!(client.unsubscribe(5).unwrap());
    assert!(client.subscribed_channels().is_empty());
    assert!(!client.is_agent_gone());

    let subs = agent.requests(MsgType::Subscribe);
    let unsubs = agent.requests(MsgType::Unsubscribe);
    assert_eq!(subs.len(), 1);
    assert_eq!(unsubs.len(), 1);
    assert_eq!(subs[0].channel_id, 5);
    assert_eq!(unsubs[0].channel_id, 5);
    assert_ne!(subs[0].transaction_id, unsubs[0].transaction_id);

    client.stop();
}

#[test]
fn repeated_subscribe_keeps_one_entry() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));

    assert!(client.subscribe(9).unwrap());
    assert!(client.subscribe(9).unwrap());
    assert_eq!(client.subscribed_channels(), vec![9]);
    assert_eq!(agent.requests(MsgType::Subscribe).len(), 2);

    client.stop();
}

#[test]
fn publish_is_acknowledged() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));

    assert!(client.publish(9, "hi").unwrap());
    assert!(!client.is_agent_gone());

    let publishes = agent.requests(MsgType::Publish);
    assert_eq!(publishes.len(), 1);
    assert_eq!(publishes[0].channel_id, 9);
    assert_eq!(publishes[0].body.as_ref(), b"hi");

    client.stop();
}

#[test]
fn publish_failure_result_is_not_an_ack() {
    let agent = FakeAgent::start(|_| Some(ResultCode::Failure));
    let client = started(config_for(&agent));

    assert!(!client.publish(2, "nope").unwrap());
    assert!(!client.is_agent_gone());

    client.stop();
}

#[test]
fn subscribe_timeout_marks_agent_gone() {
    let agent = FakeAgent::silent();
    let config = config_for(&agent);
    let budget = config.exchange_budget();
    let client = started(config);

    let start = Instant::now();
    assert!(!client.subscribe(4).unwrap());
    let elapsed = start.elapsed();

    assert!(elapsed >= budget, "returned after {elapsed:?}");
    assert!(elapsed < budget + Duration::from_millis(500), "took {elapsed:?}");
    assert!(client.is_agent_gone());
    assert_eq!(client.subscribed_channels(), vec![4]);

    client.stop();
}

#[test]
fn rejected_subscribe_stays_tracked_and_marks_gone() {
    let agent = FakeAgent::start(|_| Some(ResultCode::Failure));
    let client = started(config_for(&agent));

    assert!(!client.subscribe(6).unwrap());
    assert!(client.is_agent_gone());
    assert_eq!(client.subscribed_channels(), vec![6]);

    client.stop();
}

#[test]
fn fire_and_forget_publish_returns_immediately() {
    let agent = FakeAgent::silent();
    let client = started(config_for(&agent).with_pub_no_ack(true));

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    client.set_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let start = Instant::now();
    assert!(client.publish(3, "x").unwrap());
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(!client.is_agent_gone());

    // A late ack for the publish is dropped, not delivered.
    assert!(agent.wait_for(Duration::from_secs(1), |seen| !seen.is_empty()));
    let (publish, from) = agent.received()[0].clone();
    agent.send(&Message::response_to(&publish, ResultCode::Ack), from);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(delivered.load(Ordering::SeqCst), 0);

    client.stop();
}

#[test]
fn inbound_publish_is_acked_and_delivered_once() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));

    let (tx, rx) = std::sync::mpsc::channel();
    client.set_callback(move |msg| {
        let _ = tx.send(msg.clone());
    });

    let inbound = Message::request(MsgType::Publish, 12).with_body("data");
    agent.send(&inbound, client.local_addr().unwrap());

    let delivered = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("callback should be invoked");
    assert_eq!(delivered.channel_id, 12);
    assert_eq!(delivered.body.as_ref(), b"data");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    // The ack goes to the target and to the observed source; here both are
    // the agent, so it sees two copies.
    assert!(agent.wait_for(Duration::from_secs(1), |seen| {
        seen.iter()
            .filter(|(msg, _)| !msg.is_request && inbound.matches(msg))
            .count()
            >= 2
    }));
    for (msg, _) in agent.received() {
        if !msg.is_request {
            assert_eq!(msg.result, Some(ResultCode::Ack));
            assert_eq!(msg.transaction_id, inbound.transaction_id);
        }
    }

    client.stop();
}

#[test]
fn gone_notice_speeds_up_keepalive() {
    let agent = FakeAgent::answering();
    let config =
        config_for(&agent).with_keepalive(Duration::from_secs(30), Duration::from_millis(300));
    let client = started(config);

    assert!(client.subscribe(7).unwrap());
    assert_eq!(agent.requests(MsgType::Subscribe).len(), 1);

    agent.send(
        &Message::request(MsgType::Gone, 0),
        client.local_addr().unwrap(),
    );

    assert!(agent.wait_for(Duration::from_secs(3), |seen| {
        seen.iter()
            .filter(|(msg, _)| msg.is_request && msg.msg_type == MsgType::Subscribe)
            .count()
            >= 2
    }));
    let resub = agent.requests(MsgType::Subscribe);
    assert_eq!(resub[1].channel_id, 7);

    // The successful resubscribe restores the slow cadence.
    thread::sleep(Duration::from_millis(200));
    assert!(!client.is_agent_gone());

    client.stop();
}

#[test]
fn stop_unsubscribes_every_tracked_channel() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));

    assert!(client.subscribe(3).unwrap());
    assert!(client.subscribe(4).unwrap());
    client.stop();

    let mut channels: Vec<u8> = agent
        .requests(MsgType::Unsubscribe)
        .iter()
        .map(|msg| msg.channel_id)
        .collect();
    channels.sort_unstable();
    assert_eq!(channels, vec![3, 4]);
    assert!(client.subscribed_channels().is_empty());
}

#[test]
fn stop_completes_against_a_silent_agent() {
    let agent = FakeAgent::silent();
    let config = config_for(&agent);
    let budget = config.exchange_budget();
    let client = started(config);

    assert!(!client.subscribe(1).unwrap());
    let start = Instant::now();
    client.stop();
    // One unsubscribe budget plus join slack.
    assert!(start.elapsed() < budget + Duration::from_secs(2));
    assert_eq!(agent.requests(MsgType::Unsubscribe).len(), 1);
}

#[test]
fn stop_releases_the_local_port() {
    let agent = FakeAgent::answering();
    let client = started(config_for(&agent));
    let local = client.local_addr().unwrap();

    assert!(client.subscribe(2).unwrap());
    client.stop();

    assert!(client.local_addr().is_err());
    let rebound = UdpSocket::bind(local).expect("port should be free after stop");
    assert_eq!(rebound.local_addr().unwrap(), local);
}
