use seriallink_frame::Frame;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, FrameOutput, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = Frame::new(&args.command, &args.data, args.seq)
        .map_err(|err| frame_error("encode failed", err))?;
    print_frame(&FrameOutput::from_frame(&frame), format);
    Ok(SUCCESS)
}
