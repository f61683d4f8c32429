use std::time::Instant;

use ivcrpc_engine::{Call, Outcome};

use crate::cmd::client::Client;
use crate::cmd::{parse_duration, parse_hex, CallArgs};
use crate::exit::{rpc_error, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_call, CallReport, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let client = Client::connect(&args.path, &args.channel)?;
    let call = Call::new(args.id)
        .with_flags(args.flags)
        .with_payload(payload)
        .with_timeout(timeout);

    let started = Instant::now();
    let result = client
        .engine()
        .start(call)
        .map(|pending| {
            let seq = pending.seq();
            (seq, client.block_on(pending))
        });
    let elapsed = started.elapsed();
    client.close()?;

    let (seq, outcome) = result.map_err(|err| rpc_error("call failed", err))?;
    print_call(&CallReport::new(args.id, seq, &outcome, elapsed), format);
    Ok(exit_code(&outcome))
}

fn resolve_payload(args: &CallArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    Ok(Vec::new())
}

fn exit_code(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Completed(rsp) if rsp.return_code.is_ok() => SUCCESS,
        Outcome::TimedOut { .. } => TIMEOUT,
        _ => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ivcrpc_engine::CancelReason;
    use ivcrpc_frame::{Response, ReturnCode};

    use super::*;

    #[test]
    fn exit_code_follows_outcome() {
        let ok = Outcome::Completed(Response::ret_code(0, ReturnCode::OK));
        let unknown = Outcome::Completed(Response::ret_code(0, ReturnCode::UNKNOWN_REQUEST));
        let timed_out = Outcome::TimedOut {
            elapsed: Duration::from_millis(500),
        };
        assert_eq!(exit_code(&ok), SUCCESS);
        assert_eq!(exit_code(&unknown), FAILURE);
        assert_eq!(exit_code(&timed_out), TIMEOUT);
        assert_eq!(
            exit_code(&Outcome::Cancelled(CancelReason::ChannelClosed)),
            FAILURE
        );
    }
}
