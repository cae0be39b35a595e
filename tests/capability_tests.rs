//! Integration tests for capability discovery
//!
//! Drives a `CapabilityTable` with advertised globals the way a discovery
//! round-trip would, using plain tuples in place of protocol objects.

use lattice::error::ClientError;
use lattice::registry::{Capability, CapabilityTable};
use proptest::prelude::*;

type Table = CapabilityTable<(u32, u32)>;

fn advertise(table: &mut Table, globals: &[(u32, &str, u32)]) {
    for (name, interface, version) in globals {
        table.offer(*name, interface, *version, |_, bound| (*name, bound));
    }
}

#[test]
fn test_basic_desktop_globals_bind_without_missing_capability() {
    let mut table = Table::new();
    advertise(
        &mut table,
        &[
            (1, "wl_shm", 1),
            (2, "wl_compositor", 6),
            (3, "xdg_wm_base", 5),
            (4, "wl_seat", 9),
            (5, "wp_viewporter", 1),
        ],
    );
    table.freeze();

    assert_eq!(table.len(), 4);
    table
        .require(&[
            Capability::Shm,
            Capability::Compositor,
            Capability::WmBase,
            Capability::Seat,
        ])
        .unwrap();

    // Versions are capped at what the client asks for
    assert_eq!(table.version(Capability::Compositor), Some(4));
    assert_eq!(table.version(Capability::Seat), Some(8));
    assert_eq!(table.version(Capability::WmBase), Some(1));
}

#[test]
fn test_missing_layer_shell_is_reported_by_name() {
    let mut table = Table::new();
    advertise(&mut table, &[(1, "wl_shm", 1), (2, "wl_compositor", 4)]);
    table.freeze();

    let err = table
        .require(&[Capability::Compositor, Capability::LayerShell])
        .unwrap_err();
    assert!(matches!(err, ClientError::MissingCapability("zwlr_layer_shell_v1")));
}

#[test]
fn test_globals_after_discovery_are_not_bound() {
    let mut table = Table::new();
    advertise(&mut table, &[(1, "wl_shm", 1)]);
    table.freeze();
    advertise(&mut table, &[(9, "wl_subcompositor", 1)]);

    assert!(!table.contains(Capability::Subcompositor));
}

#[test]
fn test_global_removal_lookup() {
    let mut table = Table::new();
    advertise(&mut table, &[(10, "wl_seat", 7), (11, "wl_shm", 1)]);

    assert_eq!(table.by_global_name(10), Some(Capability::Seat));
    assert_eq!(table.by_global_name(99), None);
}

proptest! {
    /// However often an interface is advertised, the table holds one handle
    /// per capability and keeps the first binding
    #[test]
    fn prop_duplicate_globals_keep_one_handle(
        offers in prop::collection::vec((0usize..Capability::ALL.len(), 1u32..10), 1..40),
    ) {
        let mut table = Table::new();
        let mut first = std::collections::HashMap::new();

        for (name, (index, version)) in offers.iter().enumerate() {
            let capability = Capability::ALL[*index];
            let name = name as u32;
            if table.offer(name, capability.interface(), *version, |_, v| (name, v)).is_some() {
                prop_assert!(first.insert(capability, name).is_none());
            }
        }

        prop_assert_eq!(table.len(), first.len());
        for (capability, bound) in table.iter() {
            prop_assert_eq!(bound.proxy.0, first[&capability]);
            prop_assert_eq!(bound.global_name, first[&capability]);
        }
    }
}
