use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("docwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: docwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("DOCWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("DOCWIRE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("wire_version: {}", docwire_frame::PROTOCOL_VERSION);
    println!("header_size: {}", docwire_frame::HEADER_SIZE);

    Ok(SUCCESS)
}
