//! # Lattice - Wayland shared-memory client
//!
//! Lattice discovers the compositor's globals, creates surfaces in several
//! roles and keeps each of them fed with checkerboard buffers through the
//! configure → acknowledge → commit handshake.
//!
//! ## Architecture
//!
//! - `shm`: anonymous shared-memory regions
//! - `buffer`: pixel production and buffer ownership tracking
//! - `registry`: capability discovery and binding
//! - `protocol`: configure serial bookkeeping
//! - `handshake`: per-surface role state machine
//! - `client`: connection glue, event handlers and the event loop
//! - `config`: configuration parsing and management
//! - `logging`: logger setup
//!
//! Everything except `client` is free of protocol objects and can be driven
//! directly in tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lattice::LatticeConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LatticeConfig::default();
//!     lattice::client::run(config)?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod shm;

// Re-export main types for easy access
pub use buffer::{BufferLedger, Pattern, PixelRegion};
pub use config::LatticeConfig;
pub use error::ClientError;
pub use handshake::{RoleState, SurfaceSink};
pub use registry::{Capability, CapabilityTable};

/// Version information for Lattice
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
