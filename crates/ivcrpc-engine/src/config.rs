use std::time::Duration;

/// Default ceiling on simultaneously outstanding calls.
pub const DEFAULT_MAX_OUTSTANDING: usize = 64;
/// Default per-call timeout when a call does not set its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
/// Default period of the timeout ticker.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Engine tuning knobs.
///
/// The wire protocol fixes none of these; both domains pick values that
/// suit their channel.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `send` fails fast once this many calls are outstanding.
    pub max_outstanding: usize,
    /// Timeout applied to calls that do not carry one.
    pub default_timeout: Duration,
    /// How often [`crate::run_ticker`] expires overdue calls.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
            default_timeout: DEFAULT_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl EngineConfig {
    pub fn with_max_outstanding(mut self, max_outstanding: usize) -> Self {
        self.max_outstanding = max_outstanding;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
