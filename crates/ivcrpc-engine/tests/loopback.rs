//! Two engines facing each other over an in-memory channel.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ivcrpc_engine::{
    register_test_handlers, run_ticker, serve, Call, CancelReason, Disposition, EngineConfig,
    Expect, Outcome, Reply, RpcEngine, SequenceTracker, TestCall, TEST_PATTERN,
};
use ivcrpc_frame::ids::{RSP_TEST_DATA_ACK, REQ_TEST_NODATA_ACK, REQ_TEST_NODATA_NACK};
use ivcrpc_frame::{Request, ReturnCode, ReturnCodeBand, RSP_RET_CODE};
use ivcrpc_transport::{FrameSource, MemoryChannel, MemorySink, MemorySource, TransportError};

const SLOT: usize = 32 + 1024;

struct Side {
    engine: Arc<RpcEngine<MemorySink>>,
    source: MemorySource,
}

fn pair_with(caller_seq: SequenceTracker) -> (Side, Side) {
    let (a, b) = MemoryChannel::pair(SLOT, 32);
    let caller = Side {
        engine: Arc::new(RpcEngine::with_sequence(
            a.sink,
            EngineConfig::default(),
            caller_seq,
        )),
        source: a.source,
    };
    let responder = Side {
        engine: Arc::new(RpcEngine::new(b.sink, EngineConfig::default())),
        source: b.source,
    };
    register_test_handlers(&responder.engine).unwrap();
    (caller, responder)
}

fn pair() -> (Side, Side) {
    pair_with(SequenceTracker::new())
}

/// Deliver every queued frame on `side`'s channel to its engine.
fn pump(side: &mut Side) -> Vec<Disposition> {
    let mut out = Vec::new();
    while let Some(frame) = side.source.try_read_frame().unwrap() {
        out.push(side.engine.on_frame(&frame).unwrap());
    }
    out
}

fn completed(outcome: Outcome) -> ivcrpc_frame::Response {
    match outcome {
        Outcome::Completed(response) => response,
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn nodata_ack_completes_with_bare_return_code() {
    let (mut caller, mut responder) = pair();
    let call = caller
        .engine
        .send(REQ_TEST_NODATA_ACK, Bytes::new(), Duration::from_millis(500))
        .unwrap();

    pump(&mut responder);
    assert_eq!(
        pump(&mut caller),
        vec![Disposition::Completed { seq: call.seq() }]
    );

    let response = completed(call.await);
    assert_eq!(response.return_code, ReturnCode::OK);
    assert_eq!(response.response_id, RSP_RET_CODE);
    assert_eq!(caller.engine.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn nodata_nack_times_out_after_deadline() {
    let (caller, mut responder) = pair();
    let call = caller
        .engine
        .send(REQ_TEST_NODATA_NACK, Bytes::new(), Duration::from_millis(500))
        .unwrap();

    let seq = call.seq();
    assert_eq!(
        pump(&mut responder),
        vec![Disposition::Suppressed {
            seq,
            request_id: REQ_TEST_NODATA_NACK
        }]
    );

    let ticker = tokio::spawn(run_ticker(caller.engine.clone(), Duration::from_millis(10)));
    match call.await {
        Outcome::TimedOut { elapsed } => assert!(elapsed >= Duration::from_millis(500)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(caller.engine.outstanding(), 0);

    caller.engine.shutdown();
    ticker.await.unwrap();
}

#[tokio::test]
async fn data_ack_echoes_payload() {
    let (mut caller, mut responder) = pair();
    let call = caller
        .engine
        .start(TestCall::DataAck.call(TEST_PATTERN))
        .unwrap();

    pump(&mut responder);
    pump(&mut caller);

    let outcome = call.await;
    assert!(TestCall::DataAck.passed(&outcome, TEST_PATTERN));
    let response = completed(outcome);
    assert_eq!(response.response_id, RSP_TEST_DATA_ACK);
    assert_eq!(response.payload.as_ref(), TEST_PATTERN);
}

#[tokio::test]
async fn unregistered_request_answered_with_unknown_request() {
    let (mut caller, mut responder) = pair();
    let call = caller
        .engine
        .send(0x1234, &b"who?"[..], Duration::from_millis(500))
        .unwrap();

    assert_eq!(
        pump(&mut responder),
        vec![Disposition::Answered {
            seq: call.seq(),
            request_id: 0x1234,
            return_code: ReturnCode::UNKNOWN_REQUEST
        }]
    );
    pump(&mut caller);

    let response = completed(call.await);
    assert_eq!(response.return_code, ReturnCode::UNKNOWN_REQUEST);
    assert_eq!(response.return_code.band(), ReturnCodeBand::Responder);
    assert!(response.is_ret_code_only());
}

#[tokio::test]
async fn application_error_codes_reach_the_caller() {
    let (mut caller, mut responder) = pair();
    let code = ReturnCode::application(7).unwrap();
    responder
        .engine
        .register_handler(0x10, move |_: &Request| Reply::ret_code(code))
        .unwrap();

    let call = caller.engine.send(0x10, Bytes::new(), Duration::from_secs(1)).unwrap();
    pump(&mut responder);
    pump(&mut caller);

    let response = completed(call.await);
    assert_eq!(response.return_code.value(), -4103);
    assert_eq!(response.return_code.band(), ReturnCodeBand::Application);
}

#[tokio::test]
async fn sequence_numbers_wrap_through_zero() {
    let (mut caller, mut responder) = pair_with(SequenceTracker::starting_at(u32::MAX));
    let first = caller
        .engine
        .send(REQ_TEST_NODATA_ACK, Bytes::new(), Duration::from_secs(1))
        .unwrap();
    let second = caller
        .engine
        .send(REQ_TEST_NODATA_ACK, Bytes::new(), Duration::from_secs(1))
        .unwrap();
    assert_eq!(first.seq(), u32::MAX);
    assert_eq!(second.seq(), 0);

    pump(&mut responder);
    pump(&mut caller);
    assert_eq!(completed(first.await).seq, u32::MAX);
    assert_eq!(completed(second.await).seq, 0);
}

#[tokio::test(start_paused = true)]
async fn late_response_after_timeout_is_stale() {
    let (mut caller, mut responder) = pair();
    let call = caller
        .engine
        .send(REQ_TEST_NODATA_ACK, Bytes::new(), Duration::from_millis(100))
        .unwrap();
    let seq = call.seq();

    tokio::time::advance(Duration::from_millis(150)).await;
    assert_eq!(caller.engine.tick(tokio::time::Instant::now()), 1);

    // The responder answers only now.
    pump(&mut responder);
    assert_eq!(pump(&mut caller), vec![Disposition::Stale { seq }]);
    assert!(call.await.is_timed_out());
}

#[tokio::test]
async fn shutdown_cancels_with_reason() {
    let (caller, _responder) = pair();
    let call = caller
        .engine
        .start(Call::new(REQ_TEST_NODATA_ACK).with_expect(Expect::RetCodeOnly))
        .unwrap();
    assert_eq!(caller.engine.shutdown(), 1);
    assert_eq!(call.await, Outcome::Cancelled(CancelReason::Shutdown));
}

/// Memory source that reports a read timeout instead of blocking forever.
struct Polling(MemorySource);

impl FrameSource for Polling {
    fn read_frame(&mut self) -> ivcrpc_transport::Result<Bytes> {
        match self.0.read_frame_timeout(Duration::from_millis(10))? {
            Some(frame) => Ok(frame),
            None => Err(TransportError::Io(std::io::ErrorKind::WouldBlock.into())),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_channel_runs_every_test_shape() {
    let (caller, responder) = pair();

    let spawn_serve = |side: Side| {
        let engine = side.engine.clone();
        let mut source = Polling(side.source);
        (
            side.engine,
            std::thread::spawn(move || serve(&engine, &mut source)),
        )
    };
    let (caller_engine, caller_loop) = spawn_serve(caller);
    let (responder_engine, responder_loop) = spawn_serve(responder);
    let ticker = tokio::spawn(run_ticker(caller_engine.clone(), Duration::from_millis(5)));

    for shape in TestCall::ALL {
        let call = shape
            .call(TEST_PATTERN)
            .with_timeout(Duration::from_millis(100));
        let outcome = caller_engine.call(call).await.unwrap();
        assert!(shape.passed(&outcome, TEST_PATTERN), "{shape}: {outcome:?}");
    }

    // Concurrent calls each resolve exactly once.
    let calls: Vec<_> = (0..16)
        .map(|_| {
            caller_engine
                .send(REQ_TEST_NODATA_ACK, Bytes::new(), Duration::from_secs(2))
                .unwrap()
        })
        .collect();
    for call in calls {
        assert!(call.await.is_completed());
    }
    assert_eq!(caller_engine.outstanding(), 0);

    caller_engine.shutdown();
    responder_engine.shutdown();
    ticker.await.unwrap();
    let caller_stats = caller_loop.join().unwrap().unwrap();
    let responder_stats = responder_loop.join().unwrap().unwrap();
    assert_eq!(caller_stats.completed, 2 + 16);
    assert_eq!(responder_stats.answered, 2 + 16);
    assert_eq!(responder_stats.suppressed, 2);
}
