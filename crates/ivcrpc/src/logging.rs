use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Full filter directives; overrides `--log-level` when set.
pub const LOG_FILTER_ENV: &str = "IVCRPC_LOG";

/// Crates whose events follow `--log-level`. Everything else stays at warn.
const IVCRPC_TARGETS: [&str; 4] = ["ivcrpc", "ivcrpc_engine", "ivcrpc_transport", "ivcrpc_frame"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Default directives: ivcrpc crates at `level`, dependencies at warn.
pub fn default_directives(level: LogLevel) -> String {
    let level = level.as_str();
    let mut directives = String::from("warn");
    for target in IVCRPC_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Route engine and transport logs to stderr; stdout carries results.
///
/// The receive loop runs on its own named thread, so thread names are kept.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_level_to_ivcrpc_crates() {
        assert_eq!(
            default_directives(LogLevel::Debug),
            "warn,ivcrpc=debug,ivcrpc_engine=debug,ivcrpc_transport=debug,ivcrpc_frame=debug"
        );
        assert!(default_directives(LogLevel::Error).starts_with("warn,ivcrpc=error"));
    }

    #[test]
    fn default_directives_parse() {
        for level in [LogLevel::Error, LogLevel::Info, LogLevel::Trace] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok());
        }
    }
}
