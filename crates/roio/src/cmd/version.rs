use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("roio {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: roio");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("ROIO_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "wire: version={} header={}B max_body={}B",
        roio_wire::VERSION,
        roio_wire::HEADER_SIZE,
        roio_wire::MAX_BODY_SIZE
    );
    println!(
        "agent_defaults: {}:{}",
        roio_client::config::DEFAULT_HOST,
        roio_client::config::DEFAULT_PORT
    );

    Ok(SUCCESS)
}
