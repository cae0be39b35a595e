//! Ping responder
//!
//! The window-management base checks liveness with a token that must be
//! echoed back unchanged. There is no state and no failure mode of its own;
//! a broken connection surfaces on the next flush.

use log::trace;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;

/// Anything that can answer a liveness check
#[cfg_attr(test, mockall::automock)]
pub trait Pong {
    fn pong(&self, serial: u32);
}

impl Pong for XdgWmBase {
    fn pong(&self, serial: u32) {
        XdgWmBase::pong(self, serial);
    }
}

/// Echoes `serial` back to `target`
pub fn respond<T: Pong + ?Sized>(target: &T, serial: u32) {
    trace!("ping {}", serial);
    target.pong(serial);
}
