use std::io::Read;

use seriallink_frame::decode_frame;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, FrameOutput, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = match args.frame.as_deref() {
        Some(text) if text != "-" => text.as_bytes().to_vec(),
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let frame = decode_frame(&input).map_err(|err| frame_error("decode failed", err))?;
    print_frame(&FrameOutput::from_frame(&frame), format);

    // A frame that parses but fails its checksum is still reported.
    if frame.valid {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}
