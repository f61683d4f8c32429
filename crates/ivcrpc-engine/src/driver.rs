//! Loops that keep an engine fed: a blocking receive loop and an async
//! timeout ticker.

use std::io::ErrorKind as IoErrorKind;
use std::sync::Arc;
use std::time::Duration;

use ivcrpc_transport::{FrameSink, FrameSource, TransportError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{Disposition, RpcEngine};
use crate::error::{Result, RpcError};

/// Counters reported by [`serve`] when it returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub frames: u64,
    pub completed: u64,
    pub answered: u64,
    pub suppressed: u64,
    pub dropped: u64,
}

impl ServeStats {
    fn record(&mut self, disposition: Disposition) {
        self.frames += 1;
        match disposition {
            Disposition::Completed { .. } => self.completed += 1,
            Disposition::Answered { .. } => self.answered += 1,
            Disposition::Suppressed { .. } => self.suppressed += 1,
            Disposition::Stale { .. }
            | Disposition::Malformed
            | Disposition::Invalid
            | Disposition::Ignored => self.dropped += 1,
        }
    }
}

/// Feed every frame from `source` into `engine` until the channel closes or
/// the engine shuts down.
///
/// Blocks the calling thread. Give the source a read timeout so a shutdown
/// is noticed without waiting for the next frame. When the channel closes,
/// outstanding calls are cancelled.
pub fn serve<S, R>(engine: &RpcEngine<S>, source: &mut R) -> Result<ServeStats>
where
    S: FrameSink,
    R: FrameSource + ?Sized,
{
    let mut stats = ServeStats::default();
    while !engine.is_shut_down() {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(TransportError::Closed) => {
                info!(frames = stats.frames, "frame channel closed");
                engine.channel_closed();
                return Ok(stats);
            }
            Err(TransportError::Io(err))
                if matches!(err.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match engine.on_frame(&frame) {
            Ok(disposition) => stats.record(disposition),
            Err(RpcError::Transport(TransportError::Closed)) => {
                info!(frames = stats.frames, "frame channel closed while answering");
                engine.channel_closed();
                return Ok(stats);
            }
            Err(err) => {
                // The requester times out; keep serving.
                warn!(error = %err, "failed to answer request");
                stats.frames += 1;
                stats.dropped += 1;
            }
        }
    }

    debug!(frames = stats.frames, "receive loop stopped by shutdown");
    Ok(stats)
}

/// Expire overdue calls every `period` until the engine shuts down.
pub async fn run_ticker<S>(engine: Arc<RpcEngine<S>>, period: Duration)
where
    S: FrameSink + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if engine.is_shut_down() {
            break;
        }
        engine.tick(Instant::now());
    }
    debug!("ticker stopped");
}
