//! Per-service circuit breakers.
//!
//! # State Machine
//!
//! ```text
//! Closed --[consecutive failures >= failure_threshold]--> Open
//! Open --[cooldown elapsed, checked by can_request()]--> HalfOpen
//! HalfOpen --[probe succeeds]--> Closed
//! HalfOpen --[probe fails]--> Open (cooldown restarts)
//! ```
//!
//! While HalfOpen at most `half_open_probes` requests may be in flight;
//! each call claims a slot with [`CircuitBreaker::track_half_open_request`]
//! before it reaches the network.

mod registry;
mod state;

pub use registry::CircuitBreakerRegistry;
pub use state::{
    CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitStatus, ProbeClaim,
};
