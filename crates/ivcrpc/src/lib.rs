//! Request/response RPC between two execution domains that share nothing
//! but a fixed-size frame channel.
//!
//! # Crate Structure
//!
//! - [`transport`]: Frame channel abstraction (slot-framed sockets, in-memory rings)
//! - [`frame`]: Bit-exact request/response codec, return codes, typed payloads
//! - [`engine`]: Sequence numbers, pending calls, dispatch, timeouts

/// Re-export transport types.
pub mod transport {
    pub use ivcrpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ivcrpc_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use ivcrpc_engine::*;
}
