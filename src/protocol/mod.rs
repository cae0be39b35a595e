//! Configure/acknowledge ordering checks
//!
//! The server numbers every configure it sends. A client must acknowledge
//! each one exactly once, in the order received, and may not attach content
//! before its first acknowledgement. [`ConfigureGuard`] enforces this on
//! the client side so a violation surfaces as an error instead of a stalled
//! or disconnected surface.
//!
//! # Usage
//!
//! ```
//! use lattice::protocol::ConfigureGuard;
//!
//! let mut guard = ConfigureGuard::new();
//! guard.record(5).unwrap();
//! assert_eq!(guard.next_unacked(), Some(5));
//! guard.ack(5).unwrap();
//! guard.validate_content().unwrap();
//! ```

pub mod configure_guard;

pub use configure_guard::{ConfigureGuard, OrderingViolation, PendingConfigure};
