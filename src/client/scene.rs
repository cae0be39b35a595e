//! Surface roles and the scenes built from them
//!
//! The panel scene is a bottom-anchored layer surface hosting a popup, which
//! in turn hosts a sub-surface. The window scene is a single top-level.

use log::{debug, info, warn};
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_shm::WlShm, wl_subsurface::WlSubsurface, wl_surface::WlSurface,
};
use wayland_client::{Proxy, QueueHandle};
use wayland_protocols::xdg::decoration::zv1::client::zxdg_toplevel_decoration_v1::{
    self, ZxdgToplevelDecorationV1,
};
use wayland_protocols::xdg::shell::client::{
    xdg_popup::XdgPopup,
    xdg_positioner::{self, XdgPositioner},
    xdg_surface::XdgSurface,
    xdg_toplevel::XdgToplevel,
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::Layer,
    zwlr_layer_surface_v1::{Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

use super::{shm_buffer, App, BoundProxy};
use crate::buffer::{BufferId, BufferLedger, Pattern, PixelRegion};
use crate::config::{DecorationPreference, SceneKind};
use crate::error::ClientError;
use crate::handshake::compose::{self, CloseOutcome};
use crate::handshake::{Edges, Frame, RoleGeometry, RoleState, SceneHost, Size, SurfaceKey, SurfaceSink};
use crate::registry::Capability;

/// Layer surfaces accept on-demand keyboard focus from this version on
const ON_DEMAND_KEYBOARD_SINCE: u32 = 4;

/// `wl_surface.damage_buffer` exists from this version on
const DAMAGE_BUFFER_SINCE: u32 = 4;

/// Role objects layered on top of a `wl_surface`
#[derive(Debug)]
pub enum RoleObjects {
    Layer {
        layer: ZwlrLayerSurfaceV1,
    },
    Toplevel {
        xdg_surface: XdgSurface,
        toplevel: XdgToplevel,
        decoration: Option<ZxdgToplevelDecorationV1>,
    },
    Popup {
        xdg_surface: XdgSurface,
        popup: XdgPopup,
        positioner: XdgPositioner,
    },
    Subsurface {
        subsurface: WlSubsurface,
    },
}

impl RoleObjects {
    pub fn ack_configure(&self, serial: u32) {
        match self {
            RoleObjects::Layer { layer } => layer.ack_configure(serial),
            RoleObjects::Toplevel { xdg_surface, .. } | RoleObjects::Popup { xdg_surface, .. } => {
                xdg_surface.ack_configure(serial)
            }
            RoleObjects::Subsurface { .. } => {
                warn!("Sub-surfaces have no configure to acknowledge (serial {})", serial)
            }
        }
    }

    fn place(&self, offset: (i32, i32)) {
        match self {
            RoleObjects::Subsurface { subsurface } => subsurface.set_position(offset.0, offset.1),
            _ => debug!("Only sub-surfaces take a position"),
        }
    }

    /// Destroys role objects, innermost first
    fn destroy(&self) {
        match self {
            RoleObjects::Layer { layer } => layer.destroy(),
            RoleObjects::Toplevel {
                xdg_surface,
                toplevel,
                decoration,
            } => {
                if let Some(decoration) = decoration {
                    decoration.destroy();
                }
                toplevel.destroy();
                xdg_surface.destroy();
            }
            RoleObjects::Popup {
                xdg_surface,
                popup,
                positioner,
            } => {
                popup.destroy();
                positioner.destroy();
                xdg_surface.destroy();
            }
            RoleObjects::Subsurface { subsurface } => subsurface.destroy(),
        }
    }
}

/// A surface, its role objects and its handshake state
#[derive(Debug)]
pub struct Surface {
    pub wl_surface: WlSurface,
    pub objects: RoleObjects,
    pub role: RoleState,
    pub pattern: Pattern,
}

/// A buffer that has been produced but not yet attached
#[derive(Debug)]
pub struct ShmBuffer {
    id: BufferId,
    buffer: WlBuffer,
}

/// [`SurfaceSink`] that issues real requests on one surface
pub struct WaylandSink<'a> {
    surface: &'a WlSurface,
    objects: &'a RoleObjects,
    shm: Option<&'a WlShm>,
    ledger: &'a mut BufferLedger,
    qh: &'a QueueHandle<App>,
    pattern: Pattern,
    damage_buffer: bool,
}

impl SurfaceSink for WaylandSink<'_> {
    type Buffer = ShmBuffer;

    fn ack_configure(&mut self, serial: u32) {
        self.objects.ack_configure(serial);
    }

    fn produce(&mut self, size: Size) -> Result<ShmBuffer, ClientError> {
        let shm = self
            .shm
            .ok_or(ClientError::MissingCapability(Capability::Shm.interface()))?;
        let region = PixelRegion::draw(size.width, size.height, &self.pattern)?;
        let id = self.ledger.register();
        match shm_buffer::wrap(shm, region, id, self.qh) {
            Ok(buffer) => Ok(ShmBuffer { id, buffer }),
            Err(err) => {
                self.ledger.discard(id);
                Err(err)
            }
        }
    }

    fn attach(&mut self, buffer: &ShmBuffer) {
        self.surface.attach(Some(&buffer.buffer), 0, 0);
        self.ledger.mark_attached(buffer.id);
    }

    fn damage(&mut self, size: Size) {
        let width = i32::try_from(size.width).unwrap_or(i32::MAX);
        let height = i32::try_from(size.height).unwrap_or(i32::MAX);
        if self.damage_buffer {
            self.surface.damage_buffer(0, 0, width, height);
        } else {
            self.surface.damage(0, 0, width, height);
        }
    }

    fn commit(&mut self) {
        self.surface.commit();
    }

    fn place(&mut self, offset: (i32, i32)) {
        self.objects.place(offset);
    }
}

fn signed(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl SceneHost for App {
    type Buffer = ShmBuffer;

    fn with_role<R>(
        &mut self,
        key: SurfaceKey,
        f: impl FnOnce(&mut RoleState, &mut dyn SurfaceSink<Buffer = Self::Buffer>) -> Result<R, ClientError>,
    ) -> Result<Option<R>, ClientError> {
        let App {
            surfaces,
            ledger,
            capabilities,
            qh,
            ..
        } = self;
        let Some(surface) = surfaces.get_mut(&key) else {
            debug!("{:?} surface is gone; event ignored", key);
            return Ok(None);
        };

        let shm = match capabilities.get(Capability::Shm).map(|bound| &bound.proxy) {
            Ok(BoundProxy::Shm(shm)) => Some(shm),
            _ => None,
        };
        let damage_buffer = capabilities
            .version(Capability::Compositor)
            .map_or(false, |v| v >= DAMAGE_BUFFER_SINCE);

        let mut sink = WaylandSink {
            surface: &surface.wl_surface,
            objects: &surface.objects,
            shm,
            ledger,
            qh,
            pattern: surface.pattern,
            damage_buffer,
        };
        let sink: &mut dyn SurfaceSink<Buffer = ShmBuffer> = &mut sink;
        f(&mut surface.role, sink).map(Some)
    }

    fn remove(&mut self, key: SurfaceKey) -> bool {
        let Some(mut surface) = self.surfaces.remove(&key) else {
            return false;
        };
        surface.role.close();
        surface.objects.destroy();
        surface.wl_surface.destroy();
        true
    }
}

impl App {
    fn insert_surface(
        &mut self,
        key: SurfaceKey,
        wl_surface: WlSurface,
        objects: RoleObjects,
        role: RoleState,
        pattern: Pattern,
    ) -> Result<(), ClientError> {
        self.surfaces.insert(
            key,
            Surface {
                wl_surface,
                objects,
                role,
                pattern,
            },
        );
        self.with_role(key, |role, sink| role.begin(sink))?;
        Ok(())
    }

    pub(super) fn build_scene(&mut self) -> Result<(), ClientError> {
        match self.config.general.role {
            SceneKind::Panel => self.build_panel(),
            SceneKind::Window => self.build_window(),
        }
    }

    fn build_panel(&mut self) -> Result<(), ClientError> {
        self.capabilities.require(&[
            Capability::Compositor,
            Capability::Shm,
            Capability::LayerShell,
        ])?;
        let panel = self.config.panel.clone();
        let exclusive_zone = i32::try_from(panel.height)
            .map_err(|_| ClientError::Config(format!("panel height {} is too large", panel.height)))?;

        let surface = self.compositor()?.create_surface(&self.qh, ());
        let layer_shell = self.layer_shell()?;
        let layer = layer_shell.get_layer_surface(
            &surface,
            None,
            Layer::Top,
            panel.namespace.clone(),
            &self.qh,
            (),
        );
        layer.set_anchor(Anchor::Bottom | Anchor::Left | Anchor::Right);
        layer.set_exclusive_zone(exclusive_zone);
        layer.set_size(0, panel.height);
        if panel.keyboard_on_demand {
            if layer.version() >= ON_DEMAND_KEYBOARD_SINCE {
                layer.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
            } else {
                debug!("Layer shell v{} lacks on-demand keyboard focus", layer.version());
            }
        }

        let role = RoleState::new(
            RoleGeometry::Layer {
                anchor: Edges::BOTTOM_BAR,
                exclusive_zone,
            },
            panel.default_size(),
        );
        let popup_parent = layer.clone();
        self.insert_surface(
            SurfaceKey::Panel,
            surface,
            RoleObjects::Layer { layer },
            role,
            panel.pattern(),
        )?;
        info!("📐 Panel surface created ({} px tall)", panel.height);

        if self.config.popup.enabled {
            self.build_popup(&popup_parent)?;
        }
        Ok(())
    }

    fn build_popup(&mut self, parent: &ZwlrLayerSurfaceV1) -> Result<(), ClientError> {
        self.capabilities.require(&[Capability::WmBase])?;
        let popup_config = self.config.popup.clone();
        let anchor_rect = popup_config.anchor_rect(self.config.panel.height);

        let surface = self.compositor()?.create_surface(&self.qh, ());
        let wm_base = self.wm_base()?;
        let xdg_surface = wm_base.get_xdg_surface(&surface, &self.qh, SurfaceKey::Popup);
        let positioner = wm_base.create_positioner(&self.qh, ());
        positioner.set_anchor_rect(
            anchor_rect.x,
            anchor_rect.y,
            anchor_rect.width,
            anchor_rect.height,
        );
        positioner.set_anchor(xdg_positioner::Anchor::TopLeft);
        positioner.set_gravity(xdg_positioner::Gravity::TopRight);
        positioner.set_size(signed(popup_config.width), signed(popup_config.height));

        let popup = xdg_surface.get_popup(None, &positioner, &self.qh, ());
        parent.get_popup(&popup);

        // The child must exist before the popup's first commit so the first
        // configure can draw both.
        if self.config.subsurface.enabled {
            self.build_subsurface(&surface)?;
        }

        let role = RoleState::new(
            RoleGeometry::Popup {
                anchor_rect,
                placement: None,
            },
            popup_config.size(),
        );
        self.insert_surface(
            SurfaceKey::Popup,
            surface,
            RoleObjects::Popup {
                xdg_surface,
                popup,
                positioner,
            },
            role,
            popup_config.pattern(),
        )?;
        info!("📐 Popup surface created at {:?}", anchor_rect);
        Ok(())
    }

    fn build_subsurface(&mut self, parent: &WlSurface) -> Result<(), ClientError> {
        self.capabilities.require(&[Capability::Subcompositor])?;
        let child_config = self.config.subsurface.clone();

        let surface = self.compositor()?.create_surface(&self.qh, ());
        let subsurface = self
            .subcompositor()?
            .get_subsurface(&surface, parent, &self.qh, ());

        let role = RoleState::new(
            RoleGeometry::Subsurface {
                offset: (child_config.x, child_config.y),
            },
            child_config.size(),
        );
        self.insert_surface(
            SurfaceKey::PopupChild,
            surface,
            RoleObjects::Subsurface { subsurface },
            role,
            child_config.pattern(),
        )?;
        debug!("Sub-surface created at ({}, {})", child_config.x, child_config.y);
        Ok(())
    }

    fn build_window(&mut self) -> Result<(), ClientError> {
        self.capabilities.require(&[
            Capability::Compositor,
            Capability::Shm,
            Capability::WmBase,
        ])?;
        let window = self.config.window.clone();

        let surface = self.compositor()?.create_surface(&self.qh, ());
        let xdg_surface = self
            .wm_base()?
            .get_xdg_surface(&surface, &self.qh, SurfaceKey::Window);
        let toplevel = xdg_surface.get_toplevel(&self.qh, ());
        toplevel.set_title(window.title.clone());
        toplevel.set_app_id(window.app_id.clone());

        let requested = match window.decorations {
            DecorationPreference::Server => Some(zxdg_toplevel_decoration_v1::Mode::ServerSide),
            DecorationPreference::Client => Some(zxdg_toplevel_decoration_v1::Mode::ClientSide),
            DecorationPreference::None => None,
        };
        let decoration = match (requested, self.decoration_manager()) {
            (Some(mode), Ok(manager)) => {
                let decoration = manager.get_toplevel_decoration(&toplevel, &self.qh, ());
                decoration.set_mode(mode);
                Some(decoration)
            }
            (Some(_), Err(_)) => {
                info!("No decoration manager advertised; decorations are client-side");
                None
            }
            (None, _) => None,
        };

        self.insert_surface(
            SurfaceKey::Window,
            surface,
            RoleObjects::Toplevel {
                xdg_surface,
                toplevel,
                decoration,
            },
            RoleState::new(RoleGeometry::Toplevel { decoration: None }, window.default_size()),
            window.pattern(),
        )?;
        info!("🪟 Window \"{}\" created", window.title);
        Ok(())
    }

    /// Handles a configure carrying a serial for the surface under `key`
    pub(super) fn configure(&mut self, key: SurfaceKey, serial: u32, suggested: Option<Size>) {
        let result = compose::configure(self, key, serial, suggested).map(log_frame);
        self.settle(result);
    }

    /// Ordering violations drop the event; anything else is fatal
    fn settle(&mut self, result: Result<(), ClientError>) {
        match result {
            Ok(()) => {}
            Err(ClientError::ProtocolOrdering { role, violation }) => {
                warn!("Dropped {} configure: {}", role, violation);
            }
            Err(err) => self.fail(err),
        }
    }

    /// Stores a size suggestion that precedes the surface's configure
    pub(super) fn propose(&mut self, key: SurfaceKey, size: Size) {
        if let Some(surface) = self.surfaces.get_mut(&key) {
            surface.role.propose(size);
        }
    }

    /// Server-initiated close of the surface under `key`
    pub(super) fn close(&mut self, key: SurfaceKey) {
        match compose::close(self, key) {
            Ok(CloseOutcome::Exit(kind)) => self.finish(kind),
            Ok(CloseOutcome::Removed) => debug!("{:?} closed; the rest of the scene stays up", key),
            Ok(CloseOutcome::Unknown) => debug!("Close for unknown {:?} surface ignored", key),
            Err(err) => self.fail(err),
        }
    }
}

fn log_frame(frame: Option<Frame>) {
    if let Some(frame) = frame {
        debug!(
            "Frame {} acked={:?} attached={}",
            frame.size, frame.acked, frame.attached
        );
    }
}
