//! Wayland connection glue
//!
//! [`App`] is the one context object every event handler receives. It owns
//! the bound capabilities, the per-surface role state and the buffer ledger;
//! nothing lives in globals. The handshake, buffer and registry modules do
//! the bookkeeping while this module turns their decisions into requests.

pub mod event_loop;
pub mod liveness;
pub mod shm_buffer;

mod dispatch;
mod scene;

pub use crate::handshake::SurfaceKey;
pub use scene::{RoleObjects, Surface, WaylandSink};

use std::collections::HashMap;

use log::{debug, info, warn};
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_keyboard::WlKeyboard, wl_pointer::WlPointer,
    wl_registry::WlRegistry, wl_seat::WlSeat, wl_shm::WlShm, wl_subcompositor::WlSubcompositor,
};
use wayland_client::{Connection, QueueHandle};
use wayland_protocols::xdg::decoration::zv1::client::zxdg_decoration_manager_v1::ZxdgDecorationManagerV1;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;

use crate::buffer::BufferLedger;
use crate::config::LatticeConfig;
use crate::error::ClientError;
use crate::handshake::RoleKind;
use crate::registry::{Capability, CapabilityTable};
use event_loop::Session;

/// A bound global, one variant per recognized interface
#[derive(Debug, Clone)]
pub enum BoundProxy {
    Shm(WlShm),
    Compositor(WlCompositor),
    Subcompositor(WlSubcompositor),
    WmBase(XdgWmBase),
    Seat(WlSeat),
    LayerShell(ZwlrLayerShellV1),
    DecorationManager(ZxdgDecorationManagerV1),
}

impl BoundProxy {
    fn bind(
        registry: &WlRegistry,
        capability: Capability,
        name: u32,
        version: u32,
        qh: &QueueHandle<App>,
    ) -> Self {
        match capability {
            Capability::Shm => BoundProxy::Shm(registry.bind(name, version, qh, ())),
            Capability::Compositor => BoundProxy::Compositor(registry.bind(name, version, qh, ())),
            Capability::Subcompositor => {
                BoundProxy::Subcompositor(registry.bind(name, version, qh, ()))
            }
            Capability::WmBase => BoundProxy::WmBase(registry.bind(name, version, qh, ())),
            Capability::Seat => BoundProxy::Seat(registry.bind(name, version, qh, ())),
            Capability::LayerShell => BoundProxy::LayerShell(registry.bind(name, version, qh, ())),
            Capability::DecorationManager => {
                BoundProxy::DecorationManager(registry.bind(name, version, qh, ()))
            }
        }
    }
}

/// Why the event loop stopped
#[derive(Debug)]
pub enum ExitReason {
    /// The primary surface was closed by the server
    Closed(RoleKind),
    Fatal(ClientError),
}

/// Input devices requested from the seat; their events are ignored
#[derive(Debug, Default)]
struct SeatDevices {
    pointer: Option<WlPointer>,
    keyboard: Option<WlKeyboard>,
}

pub struct App {
    conn: Connection,
    qh: QueueHandle<App>,
    config: LatticeConfig,
    capabilities: CapabilityTable<BoundProxy>,
    surfaces: HashMap<SurfaceKey, Surface>,
    ledger: BufferLedger,
    seat: SeatDevices,
    exit: Option<ExitReason>,
}

impl App {
    pub fn new(conn: Connection, qh: QueueHandle<App>, config: LatticeConfig) -> Self {
        Self {
            conn,
            qh,
            config,
            capabilities: CapabilityTable::new(),
            surfaces: HashMap::new(),
            ledger: BufferLedger::new(),
            seat: SeatDevices::default(),
            exit: None,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &CapabilityTable<BoundProxy> {
        &self.capabilities
    }

    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    pub fn surface(&self, key: SurfaceKey) -> Option<&Surface> {
        self.surfaces.get(&key)
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.exit.as_ref()
    }

    pub fn take_exit(&mut self) -> Option<ExitReason> {
        self.exit.take()
    }

    /// Records a fatal error; the event loop stops after the current pass
    ///
    /// The error itself is reported once by whoever receives it from [`run`].
    pub fn fail(&mut self, err: ClientError) {
        match &self.exit {
            None => {
                debug!("Stopping after fatal error: {}", err);
                self.exit = Some(ExitReason::Fatal(err));
            }
            Some(_) => warn!("Further error while stopping: {}", err),
        }
    }

    fn finish(&mut self, kind: RoleKind) {
        if self.exit.is_none() {
            info!("Primary {} surface closed; shutting down", kind);
            self.exit = Some(ExitReason::Closed(kind));
        }
    }

    pub fn shm(&self) -> Result<&WlShm, ClientError> {
        match &self.capabilities.get(Capability::Shm)?.proxy {
            BoundProxy::Shm(shm) => Ok(shm),
            _ => Err(ClientError::MissingCapability(Capability::Shm.interface())),
        }
    }

    pub fn compositor(&self) -> Result<&WlCompositor, ClientError> {
        match &self.capabilities.get(Capability::Compositor)?.proxy {
            BoundProxy::Compositor(compositor) => Ok(compositor),
            _ => Err(ClientError::MissingCapability(Capability::Compositor.interface())),
        }
    }

    pub fn subcompositor(&self) -> Result<&WlSubcompositor, ClientError> {
        match &self.capabilities.get(Capability::Subcompositor)?.proxy {
            BoundProxy::Subcompositor(subcompositor) => Ok(subcompositor),
            _ => Err(ClientError::MissingCapability(Capability::Subcompositor.interface())),
        }
    }

    pub fn wm_base(&self) -> Result<&XdgWmBase, ClientError> {
        match &self.capabilities.get(Capability::WmBase)?.proxy {
            BoundProxy::WmBase(wm_base) => Ok(wm_base),
            _ => Err(ClientError::MissingCapability(Capability::WmBase.interface())),
        }
    }

    pub fn layer_shell(&self) -> Result<&ZwlrLayerShellV1, ClientError> {
        match &self.capabilities.get(Capability::LayerShell)?.proxy {
            BoundProxy::LayerShell(layer_shell) => Ok(layer_shell),
            _ => Err(ClientError::MissingCapability(Capability::LayerShell.interface())),
        }
    }

    pub fn decoration_manager(&self) -> Result<&ZxdgDecorationManagerV1, ClientError> {
        match &self.capabilities.get(Capability::DecorationManager)?.proxy {
            BoundProxy::DecorationManager(manager) => Ok(manager),
            _ => Err(ClientError::MissingCapability(
                Capability::DecorationManager.interface(),
            )),
        }
    }
}

/// Connects, discovers capabilities, shows the configured scene and runs
/// until the primary surface closes
pub fn run(config: LatticeConfig) -> Result<(), ClientError> {
    let conn = Connection::connect_to_env()?;
    info!("🔌 Connected to Wayland display");

    let mut queue = conn.new_event_queue();
    let qh = queue.handle();
    let _registry = conn.display().get_registry(&qh, ());

    let mut app = App::new(conn.clone(), qh, config);
    queue
        .roundtrip(&mut app)
        .map_err(|e| ClientError::dispatch("discovery", e))?;
    app.capabilities.freeze();

    app.build_scene()?;

    match event_loop::run(Session::new(app, queue))? {
        ExitReason::Closed(kind) => {
            info!("👋 {} closed, exiting", kind);
            Ok(())
        }
        ExitReason::Fatal(err) => Err(err),
    }
}
