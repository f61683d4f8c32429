use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ivcrpc_engine::{register_test_handlers, serve, EngineConfig, RpcEngine};
use ivcrpc_transport::{ChannelConfig, UnixDomainSocket};
use tracing::info;

use crate::cmd::client::SocketEngine;
use crate::cmd::ServeArgs;
use crate::exit::{rpc_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_serve_stats, OutputFormat};

type CurrentEngine = Arc<Mutex<Option<Arc<SocketEngine>>>>;

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    let channel = ChannelConfig {
        frame_size: args.channel.frame_size,
        read_timeout: Some(Duration::from_millis(100)),
        write_timeout: Some(Duration::from_secs(1)),
    };
    let config = EngineConfig::default().with_max_outstanding(args.channel.max_outstanding);

    let running = Arc::new(AtomicBool::new(true));
    let current: CurrentEngine = Arc::new(Mutex::new(None));
    install_ctrlc_handler(running.clone(), current.clone())?;

    let mut connection = 0u64;
    while running.load(Ordering::SeqCst) {
        let (mut source, sink) = listener
            .accept_channel(&channel)
            .map_err(|err| transport_error("accept failed", err))?;
        connection += 1;

        let engine = Arc::new(RpcEngine::new(sink, config.clone()));
        register_test_handlers(&engine).map_err(|err| rpc_error("handler setup failed", err))?;
        set_current(&current, Some(engine.clone()));
        info!(connection, "responder attached");

        let result = serve(&engine, &mut source);
        set_current(&current, None);
        engine.shutdown();

        let stats = result.map_err(|err| rpc_error("receive failed", err))?;
        print_serve_stats(connection, &stats, format);

        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

fn set_current(current: &CurrentEngine, engine: Option<Arc<SocketEngine>>) {
    *current
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = engine;
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, current: CurrentEngine) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        if let Some(engine) = current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            engine.shutdown();
        }
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
