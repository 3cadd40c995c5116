use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};
use roio_client::config::{DEFAULT_HOST, DEFAULT_PORT, ENV_HOST, ENV_PORT};
use roio_client::{Client, ClientConfig};

use crate::exit::{client_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod chat;
pub mod publish;
pub mod subscribe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a channel and publish each stdin line to it.
    Chat(ChatArgs),
    /// Publish a single message and wait for the agent's ack.
    Publish(PublishArgs),
    /// Subscribe to channels and print delivered messages.
    Subscribe(SubscribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, agent: &AgentArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Chat(args) => chat::run(args, agent, format),
        Command::Publish(args) => publish::run(args, agent, format),
        Command::Subscribe(args) => subscribe::run(args, agent, format),
        Command::Version(args) => version::run(args),
    }
}

/// Agent connection flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    /// Agent host.
    #[arg(long, env = ENV_HOST, default_value = DEFAULT_HOST, global = true)]
    pub host: String,
    /// Agent UDP port.
    #[arg(long, env = ENV_PORT, default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,
    /// Publish without waiting for acks.
    #[arg(long, global = true)]
    pub no_ack: bool,
}

impl AgentArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let target = roio_transport::udp::resolve(&self.host, self.port)
            .map_err(|err| transport_error("invalid agent address", err))?;
        Ok(ClientConfig::default()
            .with_target(target)
            .with_pub_no_ack(self.no_ack))
    }

    /// Bind and start a client for this agent.
    pub fn start_client(&self) -> CliResult<Client> {
        let client = Client::new(self.client_config()?)
            .map_err(|err| client_error("client setup failed", err))?;
        client
            .start()
            .map_err(|err| client_error("client start failed", err))?;
        Ok(client)
    }
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Channel to subscribe and publish on.
    #[arg(long, short = 'c', env = "CH_ID", default_value_t = 0)]
    pub channel: u16,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Channel to publish on.
    #[arg(long, short = 'c')]
    pub channel: u16,
    /// String payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Channels to subscribe to (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub channels: Vec<u16>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Reject out-of-range channel ids before any client is created.
pub fn check_channel(channel: u16) -> CliResult<u8> {
    roio_wire::validate_channel(channel).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!(
                "channel {channel} out of range [0, {}]",
                roio_wire::MAX_CHANNEL
            ),
        )
    })
}

/// Flag cleared by Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_channel_bounds() {
        assert_eq!(check_channel(0).unwrap(), 0);
        assert_eq!(check_channel(255).unwrap(), 255);
        let err = check_channel(256).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn client_config_uses_flags() {
        let agent = AgentArgs {
            host: "127.0.0.1".to_string(),
            port: 4555,
            no_ack: true,
        };
        let config = agent.client_config().unwrap();
        assert_eq!(config.target, "127.0.0.1:4555".parse().unwrap());
        assert!(config.pub_no_ack);
    }
}
