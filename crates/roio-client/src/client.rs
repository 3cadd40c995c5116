use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use roio_transport::{DatagramTransport, UdpTransport};
use roio_wire::{Message, ResultCode};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::worker::Worker;
use crate::{correlator, keepalive, processor, receiver};

/// Lifecycle of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Created,
    Running,
    Stopping,
    Stopped,
}

struct Lifecycle {
    state: ClientState,
    keepalive: Option<Worker>,
    processor: Option<Worker>,
    receiver: Option<Worker>,
}

/// Client endpoint for one agent.
///
/// Request operations block the calling thread for at most
/// [`ClientConfig::exchange_budget`] and are serialized: a second caller
/// waits for the first exchange to finish.
pub struct Client {
    session: Arc<Session>,
    lifecycle: Mutex<Lifecycle>,
}

impl Client {
    /// Bind a UDP transport and build a client for `config.target`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = UdpTransport::bind(config.bind_addr(), config.recv_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client on an existing transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn DatagramTransport>) -> Self {
        Self {
            session: Arc::new(Session::new(config, transport)),
            lifecycle: Mutex::new(Lifecycle {
                state: ClientState::Created,
                keepalive: None,
                processor: None,
                receiver: None,
            }),
        }
    }

    /// Spawn the keepalive, processor and receiver threads.
    ///
    /// If a spawn fails, the threads already running are stopped again and
    /// the client stays `Created`.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.state != ClientState::Created {
            return Err(ClientError::InvalidState {
                op: "start",
                state: lifecycle.state,
            });
        }

        info!(target = %self.session.target(), "client starting");

        let keepalive = self.spawn_worker("roio-keepalive", keepalive::run)?;
        let processor = match self.spawn_worker("roio-processor", processor::run) {
            Ok(worker) => worker,
            Err(err) => {
                self.abandon_start(vec![keepalive]);
                return Err(err);
            }
        };
        let receiver = match self.spawn_worker("roio-msgloop", receiver::run) {
            Ok(worker) => worker,
            Err(err) => {
                self.abandon_start(vec![keepalive, processor]);
                return Err(err);
            }
        };

        lifecycle.keepalive = Some(keepalive);
        lifecycle.processor = Some(processor);
        lifecycle.receiver = Some(receiver);
        lifecycle.state = ClientState::Running;
        Ok(())
    }

    /// Shut down: keepalive first, then unsubscribe every tracked channel,
    /// then the processor and receiver, then the transport.
    ///
    /// The lifecycle lock is released while this runs, so [`state`] reports
    /// `Stopping` meanwhile. Workers that miss their join deadline are
    /// detached. Calling `stop` while another stop is in progress, or after
    /// it finished, is a no-op.
    ///
    /// [`state`]: Client::state
    pub fn stop(&self) {
        let (keepalive, processor, receiver) = {
            let mut lifecycle = self.lock_lifecycle();
            match lifecycle.state {
                ClientState::Stopped | ClientState::Stopping => return,
                ClientState::Created => {
                    self.session.transport().close();
                    lifecycle.state = ClientState::Stopped;
                    return;
                }
                ClientState::Running => {}
            }
            lifecycle.state = ClientState::Stopping;
            (
                lifecycle.keepalive.take(),
                lifecycle.processor.take(),
                lifecycle.receiver.take(),
            )
        };

        info!("client stopping");
        let config = self.session.config();

        if let Some(mut worker) = keepalive {
            worker.stop(config.keepalive_join_timeout);
        }

        for channel in self.session.subscribed_snapshot() {
            correlator::subscribe(&self.session, channel, true);
        }
        self.session.lock_request().subscribed.clear();

        if let Some(mut worker) = processor {
            worker.stop(config.processor_join_timeout);
        }
        if let Some(mut worker) = receiver {
            worker.stop(config.receiver_join_timeout);
        }

        self.session.transport().close();
        self.lock_lifecycle().state = ClientState::Stopped;
        info!("client stopped");
    }

    /// Subscribe to `channel`. `Ok(false)` means the agent rejected the
    /// request or did not answer in time; the channel stays tracked either
    /// way and keepalive will retry it.
    pub fn subscribe(&self, channel: u16) -> Result<bool> {
        let channel = checked_channel(channel)?;
        Ok(correlator::subscribe(&self.session, channel, false))
    }

    /// Unsubscribe from `channel`. The channel is forgotten locally whatever
    /// the agent answers.
    pub fn unsubscribe(&self, channel: u16) -> Result<bool> {
        let channel = checked_channel(channel)?;
        Ok(correlator::subscribe(&self.session, channel, true))
    }

    /// Publish `body` on `channel`.
    ///
    /// Always `Ok(true)` in fire-and-forget mode; otherwise `Ok(true)` only
    /// once the agent acknowledged the message.
    pub fn publish(&self, channel: u16, body: impl Into<Bytes>) -> Result<bool> {
        let channel = checked_channel(channel)?;
        let body = body.into();
        if body.len() > roio_wire::MAX_BODY_SIZE {
            return Err(roio_wire::WireError::BodyTooLarge {
                size: body.len(),
                max: roio_wire::MAX_BODY_SIZE,
            }
            .into());
        }
        Ok(correlator::publish(&self.session, channel, body))
    }

    /// Answer an inbound `request` that arrived from `to`.
    pub fn respond(
        &self,
        to: SocketAddr,
        request: &Message,
        result: ResultCode,
        body: impl Into<Bytes>,
    ) -> Result<()> {
        self.session.respond(to, request, result, body.into())
    }

    /// Replace the delivery callback. Takes effect from the next delivered
    /// message.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.session.set_callback(Arc::new(callback));
    }

    /// Whether the client currently believes the agent is gone.
    pub fn is_agent_gone(&self) -> bool {
        self.session.is_agent_gone()
    }

    /// Channels currently tracked, in ascending order.
    pub fn subscribed_channels(&self) -> Vec<u8> {
        self.session.subscribed_snapshot()
    }

    pub fn state(&self) -> ClientState {
        self.lock_lifecycle().state
    }

    pub fn target(&self) -> SocketAddr {
        self.session.target()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.session.transport().local_addr()?)
    }

    pub fn config(&self) -> &ClientConfig {
        self.session.config()
    }

    fn spawn_worker(&self, name: &'static str, body: fn(&Session, &AtomicBool)) -> Result<Worker> {
        let session = Arc::clone(&self.session);
        Worker::spawn(name, move |running| body(&session, &running))
    }

    fn abandon_start(&self, workers: Vec<Worker>) {
        warn!(spawned = workers.len(), "client start failed, stopping spawned workers");
        let timeout = self.session.config().receiver_join_timeout;
        for mut worker in workers {
            worker.stop(timeout);
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.state() == ClientState::Running {
            warn!("client dropped while running, stopping");
        }
        self.stop();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("session", &self.session)
            .finish()
    }
}

fn checked_channel(channel: u16) -> Result<u8> {
    roio_wire::validate_channel(channel).ok_or(ClientError::InvalidChannel(channel))
}
