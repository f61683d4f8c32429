use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use ivcrpc_transport::{DEFAULT_FRAME_SIZE, MIN_FRAME_SIZE};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod client;
pub mod codes;
pub mod serve;
pub mod selftest;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer RPC requests on a socket (debug-test handlers installed).
    Serve(ServeArgs),
    /// Issue one RPC and print its outcome.
    Call(CallArgs),
    /// Run the four debug-test call shapes against a responder.
    Test(TestArgs),
    /// Print the return-code bands and named responder codes.
    Codes,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Test(args) => selftest::run(args, format),
        Command::Codes => codes::run(format),
        Command::Version(args) => version::run(args),
    }
}

/// Channel options shared by every socket command.
#[derive(Args, Debug, Clone)]
pub struct ChannelArgs {
    /// Bytes per channel slot. Both ends must agree.
    #[arg(
        long,
        env = "IVCRPC_FRAME_SIZE",
        default_value_t = DEFAULT_FRAME_SIZE,
        value_parser = parse_frame_size
    )]
    pub frame_size: usize,
    /// Maximum outstanding calls.
    #[arg(long, env = "IVCRPC_MAX_OUTSTANDING", default_value_t = 64)]
    pub max_outstanding: usize,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after the first connection closes.
    #[arg(long)]
    pub once: bool,
    #[command(flatten)]
    pub channel: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Request identifier (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u32)]
    pub id: u32,
    /// Request flags word.
    #[arg(long, value_parser = parse_u32, default_value = "0")]
    pub flags: u32,
    /// String payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Call timeout (e.g. 500ms, 2s).
    #[arg(long, env = "IVCRPC_TIMEOUT", default_value = "500ms")]
    pub timeout: String,
    #[command(flatten)]
    pub channel: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Per-call timeout; the NACK shapes always wait this long.
    #[arg(long, env = "IVCRPC_TIMEOUT", default_value = "500ms")]
    pub timeout: String,
    /// Payload for the data-bearing shapes.
    #[arg(long)]
    pub data: Option<String>,
    #[command(flatten)]
    pub channel: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_u32(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid u32 '{input}': {err}"))
}

pub fn parse_frame_size(input: &str) -> Result<usize, String> {
    let size: usize = input
        .trim()
        .parse()
        .map_err(|err| format!("invalid frame size '{input}': {err}"))?;
    if size < MIN_FRAME_SIZE {
        return Err(format!(
            "frame size {size} cannot hold a {MIN_FRAME_SIZE}-byte header"
        ));
    }
    Ok(size)
}

pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = pair[0].to_digit(16);
            let lo = pair[1].to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(CliError::new(
                    USAGE,
                    format!("invalid hex byte: {}{}", pair[0], pair[1]),
                )),
            }
        })
        .collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
