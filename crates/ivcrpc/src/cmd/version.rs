use ivcrpc_frame::{MAX_PAYLOAD, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
use ivcrpc_transport::DEFAULT_FRAME_SIZE;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ivcrpc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ivcrpc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("IVCRPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "wire: request_header={REQUEST_HEADER_SIZE} response_header={RESPONSE_HEADER_SIZE} max_payload={MAX_PAYLOAD} frame_size={DEFAULT_FRAME_SIZE} byte_order=little"
    );

    Ok(SUCCESS)
}
