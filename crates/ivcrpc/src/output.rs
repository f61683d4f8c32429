use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ivcrpc_engine::{Outcome, ServeStats};
use ivcrpc_frame::ids::{request_name, response_name};
use ivcrpc_frame::retcode::{
    ERR_RANGE_INIT_BEGIN, ERR_RANGE_INIT_END, ERR_RANGE_RSP_BEGIN, ERR_RANGE_RSP_END,
    ERR_RANGE_USER_BEGIN,
};
use ivcrpc_frame::ReturnCode;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One finished call, flattened for printing.
#[derive(Debug, Serialize)]
pub struct CallReport {
    pub request_id: u32,
    pub request: &'static str,
    pub seq: u32,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_band: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_data: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_received: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_sent: Option<u32>,
    pub payload_size: usize,
    pub payload: String,
    pub elapsed_ms: u64,
    pub timestamp: String,
    #[serde(skip)]
    pub raw_payload: Vec<u8>,
}

impl CallReport {
    pub fn new(request_id: u32, seq: u32, outcome: &Outcome, elapsed: Duration) -> Self {
        let mut report = Self {
            request_id,
            request: request_name(request_id),
            seq,
            outcome: outcome.label(),
            cancel_reason: None,
            return_code: None,
            return_band: None,
            return_data: None,
            response_id: None,
            response: None,
            ts_received: None,
            ts_sent: None,
            payload_size: 0,
            payload: String::new(),
            elapsed_ms: elapsed.as_millis() as u64,
            timestamp: now_unix_seconds(),
            raw_payload: Vec::new(),
        };
        match outcome {
            Outcome::Completed(rsp) => {
                report.return_code = Some(rsp.return_code.value());
                report.return_band = Some(rsp.return_code.band().as_str());
                report.return_data = Some(rsp.return_data);
                report.response_id = Some(rsp.response_id);
                report.response = Some(response_name(rsp.response_id));
                report.ts_received = Some(rsp.ts_received);
                report.ts_sent = Some(rsp.ts_sent);
                report.payload_size = rsp.payload.len();
                report.payload = payload_preview(&rsp.payload);
                report.raw_payload = rsp.payload.to_vec();
            }
            Outcome::TimedOut { elapsed } => report.elapsed_ms = elapsed.as_millis() as u64,
            Outcome::Cancelled(reason) => report.cancel_reason = Some(reason.as_str()),
        }
        report
    }
}

pub fn print_call(report: &CallReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "REQUEST", "OUTCOME", "RETURN", "RESPONSE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    report.seq.to_string(),
                    format!("{:#010x} ({})", report.request_id, report.request),
                    report.outcome.to_string(),
                    return_text(report.return_code),
                    response_text(report),
                    report.payload_size.to_string(),
                    report.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} request={:#010x} ({}) outcome={} return={} response={} size={} elapsed={}ms payload={}",
                report.seq,
                report.request_id,
                report.request,
                report.outcome,
                return_text(report.return_code),
                response_text(report),
                report.payload_size,
                report.elapsed_ms,
                report.payload
            );
        }
        OutputFormat::Raw => print_raw(&report.raw_payload),
    }
}

/// Result of one debug-test shape.
#[derive(Debug, Serialize)]
pub struct TestReport {
    pub name: &'static str,
    pub request_id: u32,
    pub outcome: &'static str,
    pub passed: bool,
    pub elapsed_ms: u64,
}

pub fn print_tests(reports: &[TestReport], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let passed = reports.iter().filter(|r| r.passed).count();
            print_json(&serde_json::json!({
                "tests": reports,
                "passed": passed,
                "failed": reports.len() - passed,
            }));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TEST", "REQUEST", "OUTCOME", "RESULT", "ELAPSED"]);
            for report in reports {
                table.add_row(vec![
                    report.name.to_string(),
                    format!("{:#010x}", report.request_id),
                    report.outcome.to_string(),
                    pass_text(report.passed).to_string(),
                    format!("{}ms", report.elapsed_ms),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                println!(
                    "{:<18} {:#010x} {:<10} {} ({}ms)",
                    report.name,
                    report.request_id,
                    report.outcome,
                    pass_text(report.passed),
                    report.elapsed_ms
                );
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct BandRow {
    band: &'static str,
    from: i32,
    to: i32,
}

#[derive(Debug, Serialize)]
struct CodeRow {
    code: i32,
    name: &'static str,
}

pub fn print_codes(format: OutputFormat) {
    let bands = [
        BandRow {
            band: "init",
            from: ERR_RANGE_INIT_BEGIN,
            to: ERR_RANGE_INIT_END,
        },
        BandRow {
            band: "responder",
            from: ERR_RANGE_RSP_BEGIN,
            to: ERR_RANGE_RSP_END,
        },
        BandRow {
            band: "application",
            from: ERR_RANGE_USER_BEGIN,
            to: i32::MIN,
        },
    ];
    let codes: Vec<CodeRow> = [
        ReturnCode::OK,
        ReturnCode::UNKNOWN_REQUEST,
        ReturnCode::UNKNOWN_REQUEST_NON_RPC,
        ReturnCode::BAD_PARAMETER,
        ReturnCode::OUT_OF_MEMORY,
        ReturnCode::NO_DEVICE,
        ReturnCode::IO_ERROR,
    ]
    .into_iter()
    .filter_map(|code| {
        code.describe().map(|name| CodeRow {
            code: code.value(),
            name,
        })
    })
    .collect();

    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            print_json(&serde_json::json!({ "bands": bands, "codes": codes }));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["BAND", "FROM", "TO"]);
            for row in &bands {
                table.add_row(vec![row.band.to_string(), row.from.to_string(), row.to.to_string()]);
            }
            println!("{table}");

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["CODE", "MEANING"]);
            for row in &codes {
                table.add_row(vec![row.code.to_string(), row.name.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &bands {
                println!("{:<12} {} ..= {}", row.band, row.from, row.to);
            }
            for row in &codes {
                println!("{:>6}  {}", row.code, row.name);
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ServeOutput<'a> {
    connection: u64,
    frames: u64,
    completed: u64,
    answered: u64,
    suppressed: u64,
    dropped: u64,
    timestamp: &'a str,
}

pub fn print_serve_stats(connection: u64, stats: &ServeStats, format: OutputFormat) {
    let timestamp = now_unix_seconds();
    let out = ServeOutput {
        connection,
        frames: stats.frames,
        completed: stats.completed,
        answered: stats.answered,
        suppressed: stats.suppressed,
        dropped: stats.dropped,
        timestamp: &timestamp,
    };
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["CONN", "FRAMES", "ANSWERED", "SUPPRESSED", "DROPPED"])
                .add_row(vec![
                    out.connection.to_string(),
                    out.frames.to_string(),
                    out.answered.to_string(),
                    out.suppressed.to_string(),
                    out.dropped.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "connection={} frames={} answered={} suppressed={} dropped={}",
                out.connection, out.frames, out.answered, out.suppressed, out.dropped
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn return_text(code: Option<i32>) -> String {
    code.map(|code| ReturnCode(code).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn response_text(report: &CallReport) -> String {
    match (report.response_id, report.response) {
        (Some(id), Some(name)) => format!("{id:#010x} ({name})"),
        _ => "-".to_string(),
    }
}

fn pass_text(passed: bool) -> &'static str {
    if passed {
        "pass"
    } else {
        "FAIL"
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
