use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Environment variable naming the agent host.
pub const ENV_HOST: &str = "ROIO_HOST";
/// Environment variable naming the agent port.
pub const ENV_PORT: &str = "ROIO_PORT";

/// Agent host used when [`ENV_HOST`] is unset.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Agent port used when [`ENV_PORT`] is unset.
pub const DEFAULT_PORT: u16 = 3333;

/// Client configuration.
///
/// Timing defaults assume the agent sits on the local network, where a
/// response slower than one second means it is not coming.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Agent address. Fixed for the lifetime of the client.
    pub target: SocketAddr,
    /// Local bind address. `None` binds an ephemeral port on the wildcard
    /// address of the target's family.
    pub bind: Option<SocketAddr>,
    /// Capacity of the response queue and of the delivery queue.
    pub queue_capacity: usize,
    /// Transport receive timeout; bounds how long the receiver thread takes
    /// to notice a stop request.
    pub recv_timeout: Duration,
    /// Fire-and-forget publishing: do not wait for acks, drop inbound
    /// publish acks.
    pub pub_no_ack: bool,
    /// Wait per response-queue pop.
    pub response_wait: Duration,
    /// Number of response-queue pops per exchange.
    pub response_attempts: u32,
    /// Keepalive loop granularity.
    pub keepalive_tick: Duration,
    /// Resubscribe interval while the agent is believed alive.
    pub keepalive_alive: Duration,
    /// Resubscribe interval while the agent is believed gone.
    pub keepalive_gone: Duration,
    /// Wait per delivery-queue pop.
    pub delivery_wait: Duration,
    /// Join deadline for the keepalive thread on stop.
    pub keepalive_join_timeout: Duration,
    /// Join deadline for the processor thread on stop.
    pub processor_join_timeout: Duration,
    /// Join deadline for the receiver thread on stop.
    pub receiver_join_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            bind: None,
            queue_capacity: 5,
            recv_timeout: Duration::from_secs(1),
            pub_no_ack: false,
            response_wait: Duration::from_millis(500),
            response_attempts: 2,
            keepalive_tick: Duration::from_millis(100),
            keepalive_alive: Duration::from_secs(30),
            keepalive_gone: Duration::from_secs(1),
            delivery_wait: Duration::from_millis(100),
            keepalive_join_timeout: Duration::from_secs(1),
            processor_join_timeout: Duration::from_secs(1),
            receiver_join_timeout: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// Defaults with the target taken from `ROIO_HOST` / `ROIO_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(ENV_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ClientError::Config(format!("{ENV_PORT} must be a port number, got '{raw}'"))
            })?,
            None => DEFAULT_PORT,
        };
        let target = roio_transport::udp::resolve(host.trim(), port)
            .map_err(|err| ClientError::Config(err.to_string()))?;
        Ok(Self::default().with_target(target))
    }

    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = Some(bind);
        self
    }

    pub fn with_pub_no_ack(mut self, pub_no_ack: bool) -> Self {
        self.pub_no_ack = pub_no_ack;
        self
    }

    /// Zero is clamped to one: a queue that holds nothing would drop every
    /// response.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_response_wait(mut self, wait: Duration, attempts: u32) -> Self {
        self.response_wait = wait;
        self.response_attempts = attempts;
        self
    }

    pub fn with_keepalive(mut self, alive: Duration, gone: Duration) -> Self {
        self.keepalive_alive = alive;
        self.keepalive_gone = gone;
        self
    }

    pub fn with_keepalive_tick(mut self, tick: Duration) -> Self {
        self.keepalive_tick = tick;
        self
    }

    /// Address the transport binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind.unwrap_or_else(|| match self.target {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        })
    }

    /// Worst-case time one request/response exchange waits.
    pub fn exchange_budget(&self) -> Duration {
        self.response_wait * self.response_attempts
    }
}
