//! Error taxonomy for the Lattice client
//!
//! Allocation and mapping failures are local to a single frame: the surface
//! skips that frame's content and the handshake carries on. Capability,
//! dispatch and connection failures end the process.

use std::io;

use thiserror::Error;

use crate::handshake::RoleKind;
use crate::protocol::OrderingViolation;

/// Why a shared-memory region could not be produced
#[derive(Debug, Error)]
pub enum AllocationFailure {
    /// Every randomly generated name was already taken
    #[error("no free shared memory name after {0} attempts")]
    NamesExhausted(u32),

    /// `shm_open` failed for a reason other than a name collision
    #[error("shm_open failed: {0}")]
    Open(#[source] io::Error),

    /// The region could not be resized to the requested length
    #[error("ftruncate failed: {0}")]
    Resize(#[source] io::Error),

    /// The requested geometry cannot describe a buffer
    #[error("invalid buffer geometry {width}x{height}")]
    Geometry { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("shared memory allocation of {size} bytes failed: {reason}")]
    Allocation {
        size: usize,
        #[source]
        reason: AllocationFailure,
    },

    #[error("mapping {size} bytes of shared memory failed: {source}")]
    Map {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("required capability `{0}` was never advertised by the server")]
    MissingCapability(&'static str),

    #[error("protocol dispatch failed during {stage}: {message}")]
    ProtocolDispatch { stage: &'static str, message: String },

    #[error("protocol ordering violation on {role} surface: {violation}")]
    ProtocolOrdering {
        role: RoleKind,
        #[source]
        violation: OrderingViolation,
    },

    #[error("failed to connect to the Wayland display: {0}")]
    Connect(#[from] wayland_client::ConnectError),

    #[error("event loop failure: {0}")]
    EventLoop(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Builds a dispatch error from any displayable protocol failure
    pub fn dispatch(stage: &'static str, err: impl std::fmt::Display) -> Self {
        ClientError::ProtocolDispatch {
            stage,
            message: err.to_string(),
        }
    }

    /// Whether the failure only costs the current frame
    pub fn is_frame_local(&self) -> bool {
        matches!(self, ClientError::Allocation { .. } | ClientError::Map { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_local_classification() {
        let alloc = ClientError::Allocation {
            size: 64,
            reason: AllocationFailure::NamesExhausted(100),
        };
        let map = ClientError::Map {
            size: 64,
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        };
        assert!(alloc.is_frame_local());
        assert!(map.is_frame_local());
        assert!(!ClientError::MissingCapability("wl_shm").is_frame_local());
        assert!(!ClientError::dispatch("read", "broken pipe").is_frame_local());
    }

    #[test]
    fn test_messages_name_the_failure() {
        let err = ClientError::MissingCapability("zwlr_layer_shell_v1");
        assert!(err.to_string().contains("zwlr_layer_shell_v1"));

        let err = ClientError::dispatch("flush", "connection reset");
        assert_eq!(
            err.to_string(),
            "protocol dispatch failed during flush: connection reset"
        );
    }
}
