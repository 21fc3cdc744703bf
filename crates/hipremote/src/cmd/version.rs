use hipremote_transport::DEFAULT_PORT;
use hipremote_wire::{DEFAULT_MAX_PAYLOAD, PROTOCOL_VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("hipremote {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: hipremote");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "protocol: {}.{}",
        PROTOCOL_VERSION >> 8,
        PROTOCOL_VERSION & 0xff
    );
    println!("default_port: {DEFAULT_PORT}");
    println!("max_payload: {DEFAULT_MAX_PAYLOAD}");
    println!(
        "build_target: {}",
        option_env!("HIPREMOTE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("features: worker={}, cli=true", cfg!(feature = "worker"));

    Ok(SUCCESS)
}
