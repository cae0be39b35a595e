//! Surface role handshake
//!
//! Every role (top-level window, layer panel, popup, sub-surface) follows the
//! same cycle:
//!
//! ```text
//! Created ──begin──► AwaitingConfigure ──configure──► Configured
//!                          ▲                              │
//!                          └────────── configure ─────────┘
//!                                                         │
//!                                     closed / popup_done ▼
//!                                                       Closed
//! ```
//!
//! After each configure the role acknowledges the serial, draws a buffer of
//! the negotiated size, attaches it and commits. The protocol side effects go
//! through a [`SurfaceSink`], so the state machine itself never touches the
//! connection.

use std::fmt;

use log::{debug, info, warn};

use crate::error::ClientError;
use crate::protocol::{ConfigureGuard, OrderingViolation};

pub mod compose;

pub use compose::{CloseOutcome, SceneHost, SurfaceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Toplevel,
    Layer,
    Popup,
    Subsurface,
}

impl RoleKind {
    /// Whether configures for this role carry a serial to acknowledge
    pub fn acknowledges(self) -> bool {
        !matches!(self, RoleKind::Subsurface)
    }

    /// Whether closing this role ends the process
    pub fn is_primary(self) -> bool {
        matches!(self, RoleKind::Toplevel | RoleKind::Layer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleKind::Toplevel => "toplevel",
            RoleKind::Layer => "layer",
            RoleKind::Popup => "popup",
            RoleKind::Subsurface => "subsurface",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Role object exists, nothing committed yet
    Created,
    /// Initial commit sent, waiting for the server to propose a size
    AwaitingConfigure,
    /// A configure has been received and the role can draw
    Configured,
    /// Server closed the role; terminal
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Server suggestion with each zero dimension replaced by the fallback
    pub fn resolve(suggested: Size, fallback: Size) -> Size {
        Size {
            width: if suggested.width == 0 { fallback.width } else { suggested.width },
            height: if suggested.height == 0 { fallback.height } else { suggested.height },
        }
    }

    /// Converts signed protocol dimensions, treating negatives as "client decides"
    pub fn from_signed(width: i32, height: i32) -> Size {
        Size::new(width.max(0) as u32, height.max(0) as u32)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// Output edges a layer surface is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl Edges {
    /// Full-width strip along the bottom of the output
    pub const BOTTOM_BAR: Edges = Edges {
        top: false,
        bottom: true,
        left: true,
        right: true,
    };

    pub fn spans_width(&self) -> bool {
        self.left && self.right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationMode {
    ClientSide,
    ServerSide,
}

/// Role-specific placement parameters
#[derive(Debug, Clone, PartialEq)]
pub enum RoleGeometry {
    Toplevel {
        decoration: Option<DecorationMode>,
    },
    Layer {
        anchor: Edges,
        exclusive_zone: i32,
    },
    Popup {
        anchor_rect: Rect,
        /// Last placement reported by the server
        placement: Option<Rect>,
    },
    Subsurface {
        offset: (i32, i32),
    },
}

impl RoleGeometry {
    pub fn kind(&self) -> RoleKind {
        match self {
            RoleGeometry::Toplevel { .. } => RoleKind::Toplevel,
            RoleGeometry::Layer { .. } => RoleKind::Layer,
            RoleGeometry::Popup { .. } => RoleKind::Popup,
            RoleGeometry::Subsurface { .. } => RoleKind::Subsurface,
        }
    }
}

/// Protocol side effects of the handshake for one surface
pub trait SurfaceSink {
    type Buffer;

    fn ack_configure(&mut self, serial: u32);

    /// Draws a buffer of exactly `size`
    fn produce(&mut self, size: Size) -> Result<Self::Buffer, ClientError>;

    fn attach(&mut self, buffer: &Self::Buffer);

    fn damage(&mut self, size: Size);

    fn commit(&mut self);

    /// Moves the surface relative to its parent; only sub-surfaces have one
    fn place(&mut self, _offset: (i32, i32)) {}
}

/// Result of responding to a configure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub size: Size,
    /// Serials acknowledged, oldest first
    pub acked: Vec<u32>,
    /// False when the buffer could not be produced and the frame was dropped
    pub attached: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleStats {
    pub configures: u64,
    pub frames: u64,
    pub dropped_frames: u64,
    pub commits: u64,
}

/// Handshake state for one surface role
#[derive(Debug)]
pub struct RoleState {
    kind: RoleKind,
    state: HandshakeState,
    size: Size,
    default_size: Size,
    proposed: Option<Size>,
    geometry: RoleGeometry,
    guard: ConfigureGuard,
    stats: RoleStats,
}

impl RoleState {
    pub fn new(geometry: RoleGeometry, default_size: Size) -> Self {
        Self {
            kind: geometry.kind(),
            state: HandshakeState::Created,
            size: Size::default(),
            default_size,
            proposed: None,
            geometry,
            guard: ConfigureGuard::new(),
            stats: RoleStats::default(),
        }
    }

    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Size negotiated by the most recent configure
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn default_size(&self) -> Size {
        self.default_size
    }

    pub fn geometry(&self) -> &RoleGeometry {
        &self.geometry
    }

    pub fn guard(&self) -> &ConfigureGuard {
        &self.guard
    }

    pub fn stats(&self) -> RoleStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.state == HandshakeState::Closed
    }

    /// Sends the bootstrap commit once role setup requests have been issued
    ///
    /// Sub-surfaces have no configure of their own, so they skip the empty
    /// commit and wait for their parent.
    pub fn begin<S: SurfaceSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), ClientError> {
        if self.state != HandshakeState::Created {
            warn!("{} role began twice (state {:?})", self.kind, self.state);
            return Ok(());
        }
        if self.kind.acknowledges() {
            sink.commit();
            self.stats.commits += 1;
        }
        self.transition(HandshakeState::AwaitingConfigure);
        Ok(())
    }

    /// Stores a size suggestion that arrives ahead of its serial
    ///
    /// xdg roles receive the size on the role object and the serial on the
    /// xdg_surface; the suggestion is consumed by the next [`on_configure`].
    ///
    /// [`on_configure`]: Self::on_configure
    pub fn propose(&mut self, size: Size) {
        self.proposed = Some(size);
    }

    /// Records a configure, resolving the size to use for the next frame
    pub fn on_configure(&mut self, serial: u32, suggested: Option<Size>) -> Result<Size, ClientError> {
        match self.state {
            HandshakeState::Closed => {
                return Err(self.violation(OrderingViolation::ConfigureAfterClose(serial)));
            }
            HandshakeState::Created => {
                warn!("{} configure {} arrived before the initial commit", self.kind, serial);
            }
            HandshakeState::Configured | HandshakeState::AwaitingConfigure => {}
        }

        // A rejected serial leaves the state untouched.
        if self.kind.acknowledges() {
            self.guard.record(serial).map_err(|v| self.violation(v))?;
        }
        if self.state == HandshakeState::Configured {
            self.transition(HandshakeState::AwaitingConfigure);
        }

        // Without a fresh hint the last negotiated size stands.
        let suggested = suggested.or(self.proposed.take()).unwrap_or(self.size);
        self.size = Size::resolve(suggested, self.default_size);
        self.stats.configures += 1;
        debug!(
            "{} configure serial={} suggested={} resolved={}",
            self.kind, serial, suggested, self.size
        );
        self.transition(HandshakeState::Configured);
        Ok(self.size)
    }

    /// Configures a sub-surface alongside its parent's configure
    pub fn adopt_parent_configure(&mut self) -> Result<Size, ClientError> {
        if self.kind.acknowledges() {
            return Err(self.violation(OrderingViolation::ContentBeforeConfigure));
        }
        if self.state == HandshakeState::Closed {
            return Err(self.violation(OrderingViolation::ContentBeforeConfigure));
        }
        let suggested = self.proposed.take().unwrap_or(self.size);
        self.size = Size::resolve(suggested, self.default_size);
        self.stats.configures += 1;
        self.transition(HandshakeState::Configured);
        Ok(self.size)
    }

    /// Acknowledges every pending configure, then draws and attaches a buffer
    ///
    /// Does not commit, so a parent can commit its children first. Buffer
    /// allocation failures drop the frame instead of failing the handshake.
    pub fn respond<S: SurfaceSink + ?Sized>(&mut self, sink: &mut S) -> Result<Frame, ClientError> {
        if self.state != HandshakeState::Configured {
            return Err(self.violation(OrderingViolation::ContentBeforeConfigure));
        }
        if let RoleGeometry::Subsurface { offset } = self.geometry {
            sink.place(offset);
        }

        let mut acked = Vec::new();
        if self.kind.acknowledges() {
            while let Some(serial) = self.guard.next_unacked() {
                self.guard.ack(serial).map_err(|v| self.violation(v))?;
                sink.ack_configure(serial);
                acked.push(serial);
            }
            self.guard.validate_content().map_err(|v| self.violation(v))?;
        }

        let size = self.size;
        let attached = match sink.produce(size) {
            Ok(buffer) => {
                sink.attach(&buffer);
                sink.damage(size);
                self.stats.frames += 1;
                true
            }
            Err(err) if err.is_frame_local() => {
                warn!("Dropping {} frame at {}: {}", self.kind, size, err);
                self.stats.dropped_frames += 1;
                false
            }
            Err(err) => return Err(err),
        };

        Ok(Frame { size, acked, attached })
    }

    pub fn commit<S: SurfaceSink + ?Sized>(&mut self, sink: &mut S) {
        sink.commit();
        self.stats.commits += 1;
    }

    /// [`respond`](Self::respond) followed by a commit
    pub fn present<S: SurfaceSink + ?Sized>(&mut self, sink: &mut S) -> Result<Frame, ClientError> {
        let frame = self.respond(sink)?;
        self.commit(sink);
        Ok(frame)
    }

    /// Popup placement update; the size feeds the next configure
    pub fn on_popup_placement(&mut self, placement: Rect) {
        match &mut self.geometry {
            RoleGeometry::Popup { placement: current, .. } => {
                *current = Some(placement);
                self.proposed = Some(Size::from_signed(placement.width, placement.height));
                debug!("popup placed at {:?}", placement);
            }
            _ => warn!("Placement update for {} role ignored", self.kind),
        }
    }

    pub fn set_decoration(&mut self, mode: DecorationMode) {
        match &mut self.geometry {
            RoleGeometry::Toplevel { decoration } => {
                *decoration = Some(mode);
                debug!("toplevel decoration mode {:?}", mode);
            }
            _ => warn!("Decoration mode for {} role ignored", self.kind),
        }
    }

    /// Marks the role closed; returns true if this ends the process
    pub fn close(&mut self) -> bool {
        if self.state != HandshakeState::Closed {
            info!("{} role closed by server", self.kind);
            self.transition(HandshakeState::Closed);
        }
        self.kind.is_primary()
    }

    fn transition(&mut self, next: HandshakeState) {
        if self.state != next {
            debug!("{} state transition: {:?} -> {:?}", self.kind, self.state, next);
            self.state = next;
        }
    }

    fn violation(&self, violation: OrderingViolation) -> ClientError {
        ClientError::ProtocolOrdering {
            role: self.kind,
            violation,
        }
    }
}

#[cfg(test)]
mod tests;
