//! HTTP middleware stack for the portal.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (add unique ID to each request)
//! 4. Access gate (session check and role-based redirects)

pub mod caller;
pub mod gate;
pub mod request_id;

pub use caller::{OptionalCaller, RequireCaller};
pub use gate::{GateDecision, GatePolicy, access_gate};
pub use request_id::request_id_middleware;
