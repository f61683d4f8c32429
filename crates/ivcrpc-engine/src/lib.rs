//! Request/response RPC engine over a fixed-size IVC frame channel.
//!
//! An [`RpcEngine`] owns one channel's sequence counter, pending-call table
//! and dispatch table. Outbound calls are written immediately and resolve
//! through a [`PendingCall`]; inbound frames are pushed in with
//! [`RpcEngine::on_frame`]; timeouts advance with [`RpcEngine::tick`].
//! [`serve`] and [`run_ticker`] wire those up to a real channel.

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod error;
pub mod pending;
pub mod selftest;
pub mod sequence;

pub use config::EngineConfig;
pub use dispatch::{DispatchTable, Handler, HandlerResponse, Reply};
pub use driver::{run_ticker, serve, ServeStats};
pub use engine::{Call, Disposition, RpcEngine};
pub use error::{ErrorKind, Result, RpcError};
pub use pending::{CancelReason, Expect, Outcome, PendingCall, PendingTable};
pub use selftest::{register_test_handlers, TestCall, TEST_PATTERN};
pub use sequence::SequenceTracker;
