//! Capability discovery bookkeeping
//!
//! The server advertises globals during the initial roundtrip. Each one whose
//! interface is in the recognized set is bound once, at the highest version
//! this client understands; everything else is ignored. After the roundtrip
//! the table is frozen.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};

use crate::error::ClientError;

/// Globals this client knows how to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Shm,
    Compositor,
    Subcompositor,
    WmBase,
    Seat,
    LayerShell,
    DecorationManager,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Shm,
        Capability::Compositor,
        Capability::Subcompositor,
        Capability::WmBase,
        Capability::Seat,
        Capability::LayerShell,
        Capability::DecorationManager,
    ];

    pub fn interface(self) -> &'static str {
        match self {
            Capability::Shm => "wl_shm",
            Capability::Compositor => "wl_compositor",
            Capability::Subcompositor => "wl_subcompositor",
            Capability::WmBase => "xdg_wm_base",
            Capability::Seat => "wl_seat",
            Capability::LayerShell => "zwlr_layer_shell_v1",
            Capability::DecorationManager => "zxdg_decoration_manager_v1",
        }
    }

    pub fn from_interface(interface: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.interface() == interface)
    }

    /// Highest version whose requests this client issues
    pub fn wanted_version(self) -> u32 {
        match self {
            // damage_buffer
            Capability::Compositor => 4,
            Capability::Seat => 8,
            // on_demand keyboard interactivity
            Capability::LayerShell => 4,
            _ => 1,
        }
    }

    pub fn minimum_version(self) -> u32 {
        1
    }

    /// Version to bind at, or `None` if the server is too old
    pub fn negotiate(self, advertised: u32) -> Option<u32> {
        if advertised < self.minimum_version() {
            None
        } else {
            Some(advertised.min(self.wanted_version()))
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface())
    }
}

/// A bound global and the version it was bound at
#[derive(Debug, Clone)]
pub struct Bound<P> {
    pub proxy: P,
    pub global_name: u32,
    pub version: u32,
}

/// One bound handle per capability
#[derive(Debug)]
pub struct CapabilityTable<P> {
    entries: BTreeMap<Capability, Bound<P>>,
    frozen: bool,
}

impl<P> Default for CapabilityTable<P> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            frozen: false,
        }
    }
}

impl<P> CapabilityTable<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one advertised global, binding it through `bind` if it is wanted
    ///
    /// Returns the capability when a bind happened. Duplicates of an already
    /// bound capability, unknown interfaces, too-old versions and anything
    /// offered after [`freeze`](Self::freeze) are ignored.
    pub fn offer<F>(
        &mut self,
        global_name: u32,
        interface: &str,
        advertised: u32,
        bind: F,
    ) -> Option<Capability>
    where
        F: FnOnce(Capability, u32) -> P,
    {
        let Some(capability) = Capability::from_interface(interface) else {
            debug!("Ignoring unrecognized global {} ({} v{})", global_name, interface, advertised);
            return None;
        };

        if self.frozen {
            warn!("Global {} advertised after discovery; not binding", capability);
            return None;
        }

        if self.entries.contains_key(&capability) {
            debug!("Duplicate {} global {} ignored", capability, global_name);
            return None;
        }

        let Some(version) = capability.negotiate(advertised) else {
            warn!(
                "{} v{} is older than required v{}",
                capability,
                advertised,
                capability.minimum_version()
            );
            return None;
        };

        let proxy = bind(capability, version);
        self.entries.insert(
            capability,
            Bound {
                proxy,
                global_name,
                version,
            },
        );
        debug!("Bound {} v{} (global {})", capability, version, global_name);
        Some(capability)
    }

    /// Ends discovery; later offers are ignored
    pub fn freeze(&mut self) {
        self.frozen = true;
        info!(
            "Capabilities bound: [{}]",
            self.entries
                .iter()
                .map(|(c, b)| format!("{} v{}", c, b.version))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn get(&self, capability: Capability) -> Result<&Bound<P>, ClientError> {
        self.entries
            .get(&capability)
            .ok_or(ClientError::MissingCapability(capability.interface()))
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.entries.contains_key(&capability)
    }

    pub fn version(&self, capability: Capability) -> Option<u32> {
        self.entries.get(&capability).map(|b| b.version)
    }

    /// Capability bound from the given global, if any
    pub fn by_global_name(&self, global_name: u32) -> Option<Capability> {
        self.entries
            .iter()
            .find(|(_, b)| b.global_name == global_name)
            .map(|(c, _)| *c)
    }

    /// Fails with the first missing capability of `required`
    pub fn require(&self, required: &[Capability]) -> Result<(), ClientError> {
        for capability in required {
            self.get(*capability)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, &Bound<P>)> {
        self.entries.iter().map(|(c, b)| (*c, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(table: &mut CapabilityTable<(Capability, u32)>, name: u32, iface: &str, v: u32) {
        table.offer(name, iface, v, |c, v| (c, v));
    }

    #[test]
    fn test_interface_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(Capability::from_interface(capability.interface()), Some(capability));
        }
        assert_eq!(Capability::from_interface("wl_output"), None);
    }

    #[test]
    fn test_negotiate_caps_at_wanted_version() {
        assert_eq!(Capability::Compositor.negotiate(6), Some(4));
        assert_eq!(Capability::Compositor.negotiate(3), Some(3));
        assert_eq!(Capability::Seat.negotiate(9), Some(8));
        assert_eq!(Capability::Shm.negotiate(0), None);
    }

    #[test]
    fn test_unknown_globals_ignored() {
        let mut table = CapabilityTable::new();
        offer(&mut table, 1, "wl_output", 4);
        offer(&mut table, 2, "zwp_linux_dmabuf_v1", 4);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_binds_once() {
        let mut table = CapabilityTable::new();
        let mut binds = 0;
        for name in [7, 8] {
            table.offer(name, "wl_seat", 8, |c, v| {
                binds += 1;
                (c, v)
            });
        }
        assert_eq!(binds, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(Capability::Seat).unwrap().global_name, 7);
    }

    #[test]
    fn test_frozen_table_ignores_late_globals() {
        let mut table = CapabilityTable::new();
        offer(&mut table, 1, "wl_shm", 1);
        table.freeze();
        offer(&mut table, 2, "wl_compositor", 4);
        assert!(table.is_frozen());
        assert!(table.contains(Capability::Shm));
        assert!(!table.contains(Capability::Compositor));
    }

    #[test]
    fn test_missing_capability_error() {
        let table: CapabilityTable<()> = CapabilityTable::new();
        match table.get(Capability::LayerShell) {
            Err(ClientError::MissingCapability(name)) => assert_eq!(name, "zwlr_layer_shell_v1"),
            other => panic!("unexpected {:?}", other.map(|b| b.version)),
        }
    }

    #[test]
    fn test_lookup_by_global_name() {
        let mut table = CapabilityTable::new();
        offer(&mut table, 12, "xdg_wm_base", 5);
        assert_eq!(table.by_global_name(12), Some(Capability::WmBase));
        assert_eq!(table.by_global_name(13), None);
        assert_eq!(table.version(Capability::WmBase), Some(1));
    }
}
