//! Event handlers
//!
//! Each handler translates one protocol event into a call on [`App`]; the
//! handshake decisions themselves live in [`crate::handshake`].

use log::{debug, info, warn};
use wayland_client::protocol::{
    wl_buffer::{self, WlBuffer},
    wl_compositor::WlCompositor,
    wl_keyboard::WlKeyboard,
    wl_pointer::WlPointer,
    wl_registry::{self, WlRegistry},
    wl_seat::{self, WlSeat},
    wl_shm::WlShm,
    wl_shm_pool::WlShmPool,
    wl_subcompositor::WlSubcompositor,
    wl_subsurface::WlSubsurface,
    wl_surface::WlSurface,
};
use wayland_client::{delegate_noop, Connection, Dispatch, QueueHandle, WEnum};
use wayland_protocols::xdg::decoration::zv1::client::{
    zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
    zxdg_toplevel_decoration_v1::{self, ZxdgToplevelDecorationV1},
};
use wayland_protocols::xdg::shell::client::{
    xdg_popup::{self, XdgPopup},
    xdg_positioner::XdgPositioner,
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::ZwlrLayerShellV1,
    zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1},
};

use super::{liveness, App, BoundProxy, SurfaceKey};
use crate::buffer::{BufferId, ReleaseOutcome};
use crate::handshake::{DecorationMode, Rect, Size};

impl Dispatch<WlRegistry, ()> for App {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                state
                    .capabilities
                    .offer(name, &interface, version, |capability, version| {
                        BoundProxy::bind(registry, capability, name, version, qh)
                    });
            }
            wl_registry::Event::GlobalRemove { name } => {
                match state.capabilities.by_global_name(name) {
                    Some(capability) => warn!("{} global {} removed; keeping our handle", capability, name),
                    None => debug!("Global {} removed", name),
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlSeat, ()> for App {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(capabilities),
            } => {
                if capabilities.contains(wl_seat::Capability::Pointer) && state.seat.pointer.is_none() {
                    state.seat.pointer = Some(seat.get_pointer(qh, ()));
                    debug!("Pointer acquired");
                }
                if capabilities.contains(wl_seat::Capability::Keyboard) && state.seat.keyboard.is_none() {
                    state.seat.keyboard = Some(seat.get_keyboard(qh, ()));
                    debug!("Keyboard acquired");
                }
            }
            wl_seat::Event::Name { name } => debug!("Seat name: {}", name),
            _ => {}
        }
    }
}

impl Dispatch<XdgWmBase, ()> for App {
    fn event(
        _: &mut Self,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            liveness::respond(wm_base, serial);
        }
    }
}

impl Dispatch<XdgSurface, SurfaceKey> for App {
    fn event(
        state: &mut Self,
        _: &XdgSurface,
        event: xdg_surface::Event,
        key: &SurfaceKey,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            state.configure(*key, serial, None);
        }
    }
}

impl Dispatch<XdgToplevel, ()> for App {
    fn event(
        state: &mut Self,
        _: &XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                state.propose(SurfaceKey::Window, Size::from_signed(width, height));
            }
            xdg_toplevel::Event::Close => state.close(SurfaceKey::Window),
            _ => {}
        }
    }
}

impl Dispatch<XdgPopup, ()> for App {
    fn event(
        state: &mut Self,
        _: &XdgPopup,
        event: xdg_popup::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_popup::Event::Configure {
                x,
                y,
                width,
                height,
            } => {
                if let Some(popup) = state.surfaces.get_mut(&SurfaceKey::Popup) {
                    popup.role.on_popup_placement(Rect::new(x, y, width, height));
                }
            }
            xdg_popup::Event::PopupDone => state.close(SurfaceKey::Popup),
            xdg_popup::Event::Repositioned { token } => debug!("Popup repositioned (token {})", token),
            _ => {}
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for App {
    fn event(
        state: &mut Self,
        _: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => state.configure(SurfaceKey::Panel, serial, Some(Size::new(width, height))),
            zwlr_layer_surface_v1::Event::Closed => state.close(SurfaceKey::Panel),
            _ => {}
        }
    }
}

impl Dispatch<ZxdgToplevelDecorationV1, ()> for App {
    fn event(
        state: &mut Self,
        _: &ZxdgToplevelDecorationV1,
        event: zxdg_toplevel_decoration_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zxdg_toplevel_decoration_v1::Event::Configure { mode } = event {
            let mode = match mode {
                WEnum::Value(zxdg_toplevel_decoration_v1::Mode::ServerSide) => DecorationMode::ServerSide,
                WEnum::Value(zxdg_toplevel_decoration_v1::Mode::ClientSide) => DecorationMode::ClientSide,
                other => {
                    warn!("Unknown decoration mode {:?}", other);
                    return;
                }
            };
            info!("Decoration mode negotiated: {:?}", mode);
            if let Some(window) = state.surfaces.get_mut(&SurfaceKey::Window) {
                window.role.set_decoration(mode);
            }
        }
    }
}

impl Dispatch<WlBuffer, BufferId> for App {
    fn event(
        state: &mut Self,
        buffer: &WlBuffer,
        event: wl_buffer::Event,
        id: &BufferId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            if state.ledger.release(*id) == ReleaseOutcome::Destroy {
                buffer.destroy();
                state.ledger.destroyed(*id);
            }
        }
    }
}

delegate_noop!(App: ignore WlSurface);
delegate_noop!(App: ignore WlShm);
delegate_noop!(App: ignore WlPointer);
delegate_noop!(App: ignore WlKeyboard);
delegate_noop!(App: WlCompositor);
delegate_noop!(App: WlShmPool);
delegate_noop!(App: WlSubcompositor);
delegate_noop!(App: WlSubsurface);
delegate_noop!(App: XdgPositioner);
delegate_noop!(App: ZwlrLayerShellV1);
delegate_noop!(App: ZxdgDecorationManagerV1);
