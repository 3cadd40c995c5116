use std::fs;

use tracing::info;

use crate::cmd::{check_channel, AgentArgs, PublishArgs};
use crate::exit::{client_error, io_error, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_publish, OutputFormat};

pub fn run(args: PublishArgs, agent: &AgentArgs, format: OutputFormat) -> CliResult<i32> {
    check_channel(args.channel)?;
    let payload = resolve_payload(&args)?;
    let size = payload.len();

    let client = agent.start_client()?;
    let outcome = client.publish(args.channel, payload);
    client.stop();

    let acknowledged = outcome.map_err(|err| client_error("publish failed", err))?;
    info!(channel = args.channel, size, acknowledged, "publish finished");
    print_publish(args.channel, size, acknowledged, agent.no_ack, format);

    if acknowledged {
        Ok(SUCCESS)
    } else {
        Ok(TIMEOUT)
    }
}

fn resolve_payload(args: &PublishArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
