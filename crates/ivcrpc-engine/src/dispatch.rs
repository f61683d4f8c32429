use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use ivcrpc_frame::{Request, ReturnCode, RSP_RET_CODE};
use tracing::debug;

use crate::error::{Result, RpcError};

/// What a handler sends back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub return_code: ReturnCode,
    pub return_data: u32,
    pub response_id: u32,
    pub payload: Bytes,
}

impl HandlerResponse {
    /// A bare return code with no payload.
    pub fn ret_code(return_code: ReturnCode) -> Self {
        Self {
            return_code,
            return_data: 0,
            response_id: RSP_RET_CODE,
            payload: Bytes::new(),
        }
    }

    /// A successful response carrying a payload.
    pub fn with_payload(response_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            return_code: ReturnCode::OK,
            return_data: 0,
            response_id,
            payload: payload.into(),
        }
    }

    pub fn return_data(mut self, return_data: u32) -> Self {
        self.return_data = return_data;
        self
    }
}

/// A handler's decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Respond(HandlerResponse),
    /// Send nothing. The caller will time out.
    Suppress,
}

impl Reply {
    pub fn ok() -> Self {
        Self::Respond(HandlerResponse::ret_code(ReturnCode::OK))
    }

    pub fn ret_code(return_code: impl Into<ReturnCode>) -> Self {
        Self::Respond(HandlerResponse::ret_code(return_code.into()))
    }

    pub fn payload(response_id: u32, payload: impl Into<Bytes>) -> Self {
        Self::Respond(HandlerResponse::with_payload(response_id, payload))
    }
}

impl From<HandlerResponse> for Reply {
    fn from(response: HandlerResponse) -> Self {
        Self::Respond(response)
    }
}

/// Responder-side handler for one request identifier.
///
/// Handlers run on whichever thread delivers the frame and must not block
/// for long; the channel is not read while a handler runs.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: &Request) -> Reply;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
{
    fn call(&self, request: &Request) -> Reply {
        self(request)
    }
}

/// Request identifier to handler map.
#[derive(Default)]
pub struct DispatchTable {
    handlers: RwLock<HashMap<u32, Arc<dyn Handler>>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request_id: u32, handler: impl Handler) -> Result<()> {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if handlers.contains_key(&request_id) {
            return Err(RpcError::DuplicateHandler(request_id));
        }
        handlers.insert(request_id, Arc::new(handler));
        debug!(request_id, "handler registered");
        Ok(())
    }

    /// Remove a handler. Returns false if none was registered.
    pub fn unregister(&self, request_id: u32) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&request_id)
            .is_some()
    }

    /// Run the handler registered for `request.request_id`.
    pub fn dispatch(&self, request: &Request) -> Result<Reply> {
        // Clone the handler out so it runs without the lock held.
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&request.request_id)
            .cloned()
            .ok_or(RpcError::UnknownRequest(request.request_id))?;
        Ok(handler.call(request))
    }

    /// Registered identifiers, ascending.
    pub fn registered(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn request(request_id: u32, payload: &'static [u8]) -> Request {
        Request {
            seq: 1,
            flags: 0,
            request_id,
            payload: Bytes::from_static(payload),
        }
    }

    #[test]
    fn dispatch_runs_registered_handler() {
        let table = DispatchTable::new();
        table
            .register(0x20, |req: &Request| {
                Reply::payload(0x21, req.payload.iter().rev().copied().collect::<Vec<u8>>())
            })
            .unwrap();

        let reply = table.dispatch(&request(0x20, b"abc")).unwrap();
        assert_eq!(reply, Reply::payload(0x21, b"cba".to_vec()));
    }

    #[test]
    fn unknown_request_is_an_error_with_protocol_code() {
        let table = DispatchTable::new();
        let err = table.dispatch(&request(0x30, b"")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRequest);
        assert_eq!(err.return_code(), ReturnCode::UNKNOWN_REQUEST);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let table = DispatchTable::new();
        table.register(0x40, |_: &Request| Reply::ok()).unwrap();
        let err = table
            .register(0x40, |_: &Request| Reply::Suppress)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateHandler);

        // The first handler stays in place.
        assert_eq!(table.dispatch(&request(0x40, b"")).unwrap(), Reply::ok());
    }

    #[test]
    fn unregister_frees_the_identifier() {
        let table = DispatchTable::new();
        table.register(0x50, |_: &Request| Reply::ok()).unwrap();
        assert!(table.unregister(0x50));
        assert!(!table.unregister(0x50));
        assert!(table.registered().is_empty());
        table.register(0x50, |_: &Request| Reply::Suppress).unwrap();
    }

    #[test]
    fn handler_may_reenter_the_table() {
        let table = Arc::new(DispatchTable::new());
        let inner = table.clone();
        table
            .register(0x60, move |_: &Request| {
                Reply::ret_code(inner.registered().len() as i32)
            })
            .unwrap();
        assert_eq!(
            table.dispatch(&request(0x60, b"")).unwrap(),
            Reply::ret_code(1)
        );
    }

    #[test]
    fn registered_is_sorted() {
        let table = DispatchTable::new();
        for id in [9u32, 3, 7] {
            table.register(id, |_: &Request| Reply::ok()).unwrap();
        }
        assert_eq!(table.registered(), vec![3, 7, 9]);
    }
}
