use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("seriallink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: seriallink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SERIALLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: async={}, cli=true",
        cfg!(feature = "async")
    );
    println!(
        "protocol: max_channels={}, max_cmd={}, max_data={}, tx_buffer={}",
        seriallink_channel::MAX_CHANNELS,
        seriallink_frame::MAX_CMD_LEN,
        seriallink_frame::MAX_DATA_LEN,
        seriallink_frame::TX_BUFFER_SIZE
    );

    Ok(SUCCESS)
}
