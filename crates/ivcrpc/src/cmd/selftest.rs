use std::time::Instant;

use ivcrpc_engine::{TestCall, TEST_PATTERN};

use crate::cmd::client::Client;
use crate::cmd::{parse_duration, TestArgs};
use crate::exit::{rpc_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_tests, OutputFormat, TestReport};

pub fn run(args: TestArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = args
        .data
        .as_deref()
        .map(str::as_bytes)
        .unwrap_or(TEST_PATTERN);

    let client = Client::connect(&args.path, &args.channel)?;
    let mut reports = Vec::with_capacity(TestCall::ALL.len());
    let mut failure = None;

    for shape in TestCall::ALL {
        let started = Instant::now();
        match client.block_on(client.engine().call(shape.call(payload).with_timeout(timeout))) {
            Ok(outcome) => reports.push(TestReport {
                name: shape.name(),
                request_id: shape.request_id(),
                outcome: outcome.label(),
                passed: shape.passed(&outcome, payload),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            Err(err) => {
                failure = Some(rpc_error(&format!("{shape} failed"), err));
                break;
            }
        }
    }
    client.close()?;

    if let Some(err) = failure {
        return Err(err);
    }
    print_tests(&reports, format);
    if reports.iter().all(|r| r.passed) {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
