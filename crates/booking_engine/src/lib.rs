//! # Booking Engine
//!
//! This crate drives an appointment-booking web service. It owns the
//! cookie-backed HTTP session, the SMS verification flow that yields a
//! booking code, and the polling loop that probes a set of locations until
//! an appointment is booked.

/// Domain types, validation helpers and error enums
mod types;
pub use types::*;

/// Cookie-backed session handling
mod session_manager;
pub use session_manager::*;

/// HTTP client for the remote booking service
mod service_client;
pub use service_client::*;

/// SMS verification code request and confirmation
mod verification;
pub use verification::*;

/// Probe/book loop over a location set
mod poller;
pub use poller::*;

/// Facade tying session, verification and polling together
mod engine;
pub use engine::*;

/// Run-mode state machine used by the interactive menu
mod workflow;
pub use workflow::*;
