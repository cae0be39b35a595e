//! Handshakes spanning several surfaces
//!
//! A popup hosts a sub-surface that has no configure of its own. The child
//! is drawn in the popup's cycle and committed before it, so both show up in
//! the same frame. Closing the popup takes the child down with it.

use log::debug;

use super::{Frame, RoleKind, RoleState, Size, SurfaceSink};
use crate::error::ClientError;

/// Identifies a surface in a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKey {
    Panel,
    Popup,
    PopupChild,
    Window,
}

impl SurfaceKey {
    /// The surface drawn in this one's configure cycle, if any
    pub fn hosted(self) -> Option<SurfaceKey> {
        match self {
            SurfaceKey::Popup => Some(SurfaceKey::PopupChild),
            _ => None,
        }
    }
}

/// Owner of a scene's surfaces
pub trait SceneHost {
    type Buffer;

    /// Runs `f` on the role and sink under `key`; `Ok(None)` when it is gone
    fn with_role<R>(
        &mut self,
        key: SurfaceKey,
        f: impl FnOnce(&mut RoleState, &mut dyn SurfaceSink<Buffer = Self::Buffer>) -> Result<R, ClientError>,
    ) -> Result<Option<R>, ClientError>;

    /// Destroys the surface under `key`; false when there was none
    fn remove(&mut self, key: SurfaceKey) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// No such surface
    Unknown,
    /// A primary role closed; the process should end
    Exit(RoleKind),
    /// The surface and everything it hosted were destroyed
    Removed,
}

/// Answers a configure for `key` and for the surface it hosts
///
/// Returns `Ok(None)` when the surface no longer exists.
pub fn configure<H: SceneHost>(
    host: &mut H,
    key: SurfaceKey,
    serial: u32,
    suggested: Option<Size>,
) -> Result<Option<Frame>, ClientError> {
    let Some(frame) = host.with_role(key, |role, sink| {
        role.on_configure(serial, suggested)?;
        role.respond(sink)
    })?
    else {
        return Ok(None);
    };

    if let Some(child) = key.hosted() {
        host.with_role(child, |role, sink| {
            role.adopt_parent_configure()?;
            role.present(sink)
        })?;
    }

    host.with_role(key, |role, sink| {
        role.commit(sink);
        Ok(())
    })?;
    Ok(Some(frame))
}

/// Server-initiated close of the surface under `key`
pub fn close<H: SceneHost>(host: &mut H, key: SurfaceKey) -> Result<CloseOutcome, ClientError> {
    let closed = host.with_role(key, |role, _| Ok((role.kind(), role.close())))?;
    match closed {
        None => Ok(CloseOutcome::Unknown),
        Some((kind, true)) => Ok(CloseOutcome::Exit(kind)),
        Some((_, false)) => {
            teardown(host, key);
            Ok(CloseOutcome::Removed)
        }
    }
}

fn teardown<H: SceneHost>(host: &mut H, key: SurfaceKey) {
    if let Some(child) = key.hosted() {
        teardown(host, child);
    }
    if host.remove(key) {
        debug!("{:?} surface torn down", key);
    }
}
