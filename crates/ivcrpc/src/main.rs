mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ivcrpc", version, about = "IVC RPC engine CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "IVCRPC_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "ivcrpc",
            "call",
            "/tmp/test.sock",
            "--id",
            "0x7ffffe02",
            "--data",
            "hello",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.id, 0x7fff_fe02);
                assert_eq!(args.data.as_deref(), Some("hello"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "ivcrpc",
            "call",
            "/tmp/test.sock",
            "--id",
            "1",
            "--hex",
            "00ff",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_test_subcommand() {
        let cli = Cli::try_parse_from(["ivcrpc", "test", "/tmp/test.sock", "--timeout", "200ms"])
            .expect("test args should parse");
        assert!(matches!(cli.command, Command::Test(_)));
    }

    #[test]
    fn rejects_frame_size_below_header() {
        let err = Cli::try_parse_from([
            "ivcrpc",
            "serve",
            "/tmp/test.sock",
            "--frame-size",
            "0",
        ])
        .expect_err("zero frame size should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn call_requires_request_id() {
        let err = Cli::try_parse_from(["ivcrpc", "call", "/tmp/test.sock"])
            .expect_err("missing --id should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
