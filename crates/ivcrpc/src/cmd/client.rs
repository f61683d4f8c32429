use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use ivcrpc_engine::{run_ticker, serve, EngineConfig, RpcEngine, ServeStats};
use ivcrpc_transport::{ChannelConfig, IpcStream, SlotWriter, UnixDomainSocket};
use tracing::debug;

use crate::cmd::ChannelArgs;
use crate::exit::{rpc_error, transport_error, CliError, CliResult, INTERNAL};

/// How long the receive loop blocks before rechecking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub type SocketEngine = RpcEngine<SlotWriter<IpcStream>>;

/// A caller-side engine on a connected socket, with its receive loop on a
/// background thread and its ticker on a local runtime.
pub struct Client {
    engine: Arc<SocketEngine>,
    receiver: JoinHandle<ivcrpc_engine::Result<ServeStats>>,
    runtime: tokio::runtime::Runtime,
}

impl Client {
    pub fn connect(path: &Path, args: &ChannelArgs) -> CliResult<Self> {
        let channel = ChannelConfig {
            frame_size: args.frame_size,
            read_timeout: Some(POLL_INTERVAL),
            write_timeout: Some(Duration::from_secs(1)),
        };
        let (mut source, sink) = UnixDomainSocket::connect_channel(path, &channel)
            .map_err(|err| transport_error("connect failed", err))?;

        let config = EngineConfig::default().with_max_outstanding(args.max_outstanding);
        let engine = Arc::new(RpcEngine::new(sink, config));

        let loop_engine = engine.clone();
        let receiver = std::thread::Builder::new()
            .name("ivcrpc-recv".to_string())
            .spawn(move || serve(&loop_engine, &mut source))
            .map_err(|err| CliError::new(INTERNAL, format!("receive thread failed: {err}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
        runtime.spawn(run_ticker(engine.clone(), engine.config().tick_interval));

        debug!(path = %path.display(), "client connected");
        Ok(Self {
            engine,
            receiver,
            runtime,
        })
    }

    pub fn engine(&self) -> &SocketEngine {
        &self.engine
    }

    /// Drive `future` on the client runtime; the ticker runs alongside it.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Shut the engine down and wait for the receive loop to stop.
    pub fn close(self) -> CliResult<ServeStats> {
        self.engine.shutdown();
        let stats = self
            .receiver
            .join()
            .map_err(|_| CliError::new(INTERNAL, "receive thread panicked"))?
            .map_err(|err| rpc_error("receive failed", err))?;
        debug!(frames = stats.frames, "client closed");
        Ok(stats)
    }
}
