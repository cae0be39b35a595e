//! Unit tests for the role handshake
//!
//! A recording sink stands in for the connection so each test can assert the
//! exact sequence of protocol requests a configure produces.

use super::*;
use crate::error::AllocationFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Ack(u32),
    Produce(Size),
    Attach(Size),
    Damage(Size),
    Commit,
}

#[derive(Default)]
struct RecordingSink {
    ops: Vec<Op>,
    fail_next: Option<ClientError>,
}

impl SurfaceSink for RecordingSink {
    type Buffer = Size;

    fn ack_configure(&mut self, serial: u32) {
        self.ops.push(Op::Ack(serial));
    }

    fn produce(&mut self, size: Size) -> Result<Size, ClientError> {
        self.ops.push(Op::Produce(size));
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(size),
        }
    }

    fn attach(&mut self, buffer: &Size) {
        self.ops.push(Op::Attach(*buffer));
    }

    fn damage(&mut self, size: Size) {
        self.ops.push(Op::Damage(size));
    }

    fn commit(&mut self) {
        self.ops.push(Op::Commit);
    }
}

fn toplevel() -> RoleState {
    RoleState::new(RoleGeometry::Toplevel { decoration: None }, Size::new(640, 480))
}

fn panel() -> RoleState {
    RoleState::new(
        RoleGeometry::Layer {
            anchor: Edges::BOTTOM_BAR,
            exclusive_zone: 100,
        },
        Size::new(1280, 100),
    )
}

fn popup() -> RoleState {
    RoleState::new(
        RoleGeometry::Popup {
            anchor_rect: Rect::new(200, 0, 50, 100),
            placement: None,
        },
        Size::new(100, 50),
    )
}

fn subsurface() -> RoleState {
    RoleState::new(RoleGeometry::Subsurface { offset: (10, 10) }, Size::new(20, 20))
}

#[test]
fn test_begin_sends_bootstrap_commit() {
    let mut role = toplevel();
    let mut sink = RecordingSink::default();
    assert_eq!(role.state(), HandshakeState::Created);

    role.begin(&mut sink).unwrap();
    assert_eq!(role.state(), HandshakeState::AwaitingConfigure);
    assert_eq!(sink.ops, vec![Op::Commit]);
}

#[test]
fn test_toplevel_configure_ack_draw_commit() {
    let mut role = toplevel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    sink.ops.clear();

    role.propose(Size::new(600, 600));
    assert_eq!(role.on_configure(1, None).unwrap(), Size::new(600, 600));
    assert_eq!(role.state(), HandshakeState::Configured);

    let frame = role.present(&mut sink).unwrap();
    assert_eq!(frame.acked, vec![1]);
    assert!(frame.attached);
    let size = Size::new(600, 600);
    assert_eq!(
        sink.ops,
        vec![
            Op::Ack(1),
            Op::Produce(size),
            Op::Attach(size),
            Op::Damage(size),
            Op::Commit
        ]
    );
}

#[test]
fn test_zero_size_falls_back_to_default() {
    let mut role = toplevel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    assert_eq!(role.on_configure(4, Some(Size::new(0, 0))).unwrap(), Size::new(640, 480));
}

#[test]
fn test_layer_zero_width_uses_fallback_width() {
    let mut role = panel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();

    let size = role.on_configure(5, Some(Size::new(0, 100))).unwrap();
    assert_eq!(size, Size::new(1280, 100));
    assert!(matches!(
        role.geometry(),
        RoleGeometry::Layer { exclusive_zone: 100, .. }
    ));
}

#[test]
fn test_reconfigure_cycle_acks_each_serial_once_in_order() {
    let mut role = panel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();

    let mut acked = Vec::new();
    for (serial, width) in [(10, 800), (11, 1024), (12, 1920)] {
        role.on_configure(serial, Some(Size::new(width, 100))).unwrap();
        let frame = role.present(&mut sink).unwrap();
        assert_eq!(frame.size, Size::new(width, 100));
        acked.extend(frame.acked);
    }

    assert_eq!(acked, vec![10, 11, 12]);
    let acks: Vec<_> = sink.ops.iter().filter(|op| matches!(op, Op::Ack(_))).collect();
    assert_eq!(acks, vec![&Op::Ack(10), &Op::Ack(11), &Op::Ack(12)]);
    assert_eq!(role.stats().configures, 3);
    assert_eq!(role.stats().frames, 3);
}

#[test]
fn test_back_to_back_configures_are_acked_oldest_first() {
    let mut role = panel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();

    role.on_configure(20, Some(Size::new(800, 100))).unwrap();
    role.on_configure(21, Some(Size::new(900, 100))).unwrap();
    let frame = role.present(&mut sink).unwrap();

    assert_eq!(frame.acked, vec![20, 21]);
    assert_eq!(frame.size, Size::new(900, 100));
}

#[test]
fn test_content_before_configure_is_rejected() {
    let mut role = toplevel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    sink.ops.clear();

    let err = role.respond(&mut sink).unwrap_err();
    assert!(matches!(
        err,
        ClientError::ProtocolOrdering {
            role: RoleKind::Toplevel,
            violation: OrderingViolation::ContentBeforeConfigure
        }
    ));
    assert!(sink.ops.is_empty());
}

#[test]
fn test_duplicate_serial_is_rejected() {
    let mut role = panel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    role.on_configure(7, None).unwrap();
    role.present(&mut sink).unwrap();

    let err = role.on_configure(7, None).unwrap_err();
    assert!(matches!(
        err,
        ClientError::ProtocolOrdering {
            violation: OrderingViolation::DuplicateSerial(7),
            ..
        }
    ));
}

#[test]
fn test_allocation_failure_drops_frame_but_still_acks() {
    let mut role = toplevel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    sink.ops.clear();
    sink.fail_next = Some(ClientError::Allocation {
        size: 0,
        reason: AllocationFailure::NamesExhausted(100),
    });

    role.on_configure(2, Some(Size::new(300, 200))).unwrap();
    let frame = role.present(&mut sink).unwrap();

    assert!(!frame.attached);
    assert_eq!(
        sink.ops,
        vec![Op::Ack(2), Op::Produce(Size::new(300, 200)), Op::Commit]
    );
    assert_eq!(role.stats().dropped_frames, 1);
}

#[test]
fn test_fatal_produce_error_propagates() {
    let mut role = toplevel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    sink.fail_next = Some(ClientError::MissingCapability("wl_shm"));

    role.on_configure(3, None).unwrap();
    assert!(matches!(
        role.respond(&mut sink),
        Err(ClientError::MissingCapability("wl_shm"))
    ));
}

#[test]
fn test_popup_placement_sets_next_size() {
    let mut role = popup();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();

    role.on_popup_placement(Rect::new(200, -50, 120, 60));
    assert_eq!(role.on_configure(30, None).unwrap(), Size::new(120, 60));
    assert!(matches!(
        role.geometry(),
        RoleGeometry::Popup {
            placement: Some(Rect { x: 200, y: -50, .. }),
            ..
        }
    ));
}

#[test]
fn test_subsurface_follows_parent_without_acks() {
    let mut child = subsurface();
    let mut sink = RecordingSink::default();
    child.begin(&mut sink).unwrap();
    assert!(sink.ops.is_empty());

    assert_eq!(child.adopt_parent_configure().unwrap(), Size::new(20, 20));
    let frame = child.present(&mut sink).unwrap();
    assert!(frame.acked.is_empty());
    assert_eq!(sink.ops.first(), Some(&Op::Produce(Size::new(20, 20))));
    assert_eq!(sink.ops.last(), Some(&Op::Commit));
}

#[test]
fn test_close_semantics_per_role() {
    assert!(toplevel().close());
    assert!(panel().close());
    assert!(!popup().close());
    assert!(!subsurface().close());
}

#[test]
fn test_configure_after_close_is_rejected() {
    let mut role = popup();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    role.close();
    assert!(role.is_closed());
    assert!(matches!(
        role.on_configure(40, None),
        Err(ClientError::ProtocolOrdering {
            violation: OrderingViolation::ConfigureAfterClose(40),
            ..
        })
    ));
}

#[test]
fn test_decoration_mode_recorded_on_toplevel() {
    let mut role = toplevel();
    role.set_decoration(DecorationMode::ServerSide);
    assert_eq!(
        role.geometry(),
        &RoleGeometry::Toplevel {
            decoration: Some(DecorationMode::ServerSide)
        }
    );
}

#[test]
fn test_configure_without_hint_keeps_negotiated_size() {
    let mut role = popup();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();

    role.on_popup_placement(Rect::new(200, -60, 140, 60));
    role.on_configure(50, None).unwrap();
    role.present(&mut sink).unwrap();

    assert_eq!(role.on_configure(51, None).unwrap(), Size::new(140, 60));
}

#[test]
fn test_rejected_serial_leaves_role_configured() {
    let mut role = panel();
    let mut sink = RecordingSink::default();
    role.begin(&mut sink).unwrap();
    role.on_configure(8, Some(Size::new(800, 100))).unwrap();
    role.present(&mut sink).unwrap();

    assert!(role.on_configure(8, Some(Size::new(900, 100))).is_err());
    assert_eq!(role.state(), HandshakeState::Configured);
    assert_eq!(role.size(), Size::new(800, 100));
    assert_eq!(role.stats().configures, 1);
}
