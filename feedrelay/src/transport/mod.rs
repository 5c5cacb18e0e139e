//! HTTP transport abstraction.
//!
//! The orchestrator only ever needs a GET with headers and a per-call
//! deadline, so that is the whole trait. [`ReqwestTransport`] is the
//! production implementation; tests inject a scripted transport.

mod http;
#[cfg(test)]
pub mod mock;

pub use http::{HttpResponse, HttpTransport, ReqwestTransport, DEFAULT_USER_AGENT};

#[cfg(test)]
pub use mock::MockTransport;
