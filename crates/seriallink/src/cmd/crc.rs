use serde::Serialize;
use seriallink_frame::crc;

use crate::cmd::CrcArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, print_raw, OutputFormat};

#[derive(Serialize)]
struct CrcOutput {
    length: usize,
    crc: String,
}

pub fn run(args: CrcArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = match (&args.text, &args.hex) {
        (_, Some(hex)) => parse_hex(hex)?,
        (Some(text), None) => text.as_bytes().to_vec(),
        (None, None) => return Err(CliError::new(USAGE, "provide TEXT or --hex")),
    };

    let out = CrcOutput {
        length: bytes.len(),
        crc: format!("{:02X}", crc::compute(&bytes)),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Raw => print_raw(out.crc.as_bytes()),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("crc={} length={}", out.crc, out.length);
        }
    }
    Ok(SUCCESS)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text: String = pair.iter().collect();
            u8::from_str_radix(&text, 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte: {text}")))
        })
        .collect()
}
