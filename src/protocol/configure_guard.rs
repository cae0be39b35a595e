//! Per-role configure serial tracking

use std::collections::VecDeque;
use std::time::Instant;

use log::{debug, error, warn};
use thiserror::Error;

/// A configure received from the server and not yet acknowledged
#[derive(Debug, Clone)]
pub struct PendingConfigure {
    pub serial: u32,
    pub received_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingViolation {
    /// Acknowledging a serial that was never received or is already acknowledged
    #[error("acknowledged unknown serial {serial} (pending: {pending:?})")]
    UnknownSerial { serial: u32, pending: Vec<u32> },

    /// The same serial arrived twice
    #[error("configure serial {0} received twice")]
    DuplicateSerial(u32),

    /// A newer serial was acknowledged while an older one is still pending
    #[error("acknowledged serial {serial} before pending serial {expected}")]
    OutOfOrder { serial: u32, expected: u32 },

    /// Content was attached before any configure was acknowledged
    #[error("content attached before the first configure was acknowledged")]
    ContentBeforeConfigure,

    /// Content was attached while a configure is still unacknowledged
    #[error("content attached with configure {0} still unacknowledged")]
    UnackedConfigure(u32),

    /// A configure arrived for a role that was already closed
    #[error("configure serial {0} received after the role was closed")]
    ConfigureAfterClose(u32),
}

/// Serial bookkeeping for one surface role
#[derive(Debug, Default)]
pub struct ConfigureGuard {
    pending: VecDeque<PendingConfigure>,
    last_acked: Option<u32>,
    acked_count: u64,
}

impl ConfigureGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a configure serial received from the server
    pub fn record(&mut self, serial: u32) -> Result<(), OrderingViolation> {
        if self.last_acked == Some(serial) || self.pending.iter().any(|c| c.serial == serial) {
            warn!("Configure serial {} received twice", serial);
            return Err(OrderingViolation::DuplicateSerial(serial));
        }

        self.pending.push_back(PendingConfigure {
            serial,
            received_at: Instant::now(),
        });
        debug!(
            "Configure serial {} recorded, pending_count={}",
            serial,
            self.pending.len()
        );
        Ok(())
    }

    /// Oldest serial still owed an acknowledgement
    pub fn next_unacked(&self) -> Option<u32> {
        self.pending.front().map(|c| c.serial)
    }

    /// Validates and records an acknowledgement
    pub fn ack(&mut self, serial: u32) -> Result<(), OrderingViolation> {
        match self.next_unacked() {
            Some(expected) if expected == serial => {
                if let Some(configure) = self.pending.pop_front() {
                    debug!(
                        "Acknowledged serial {} after {:?}",
                        serial,
                        configure.received_at.elapsed()
                    );
                }
                self.last_acked = Some(serial);
                self.acked_count += 1;
                Ok(())
            }
            Some(expected) if self.pending.iter().any(|c| c.serial == serial) => {
                error!("Serial {} acknowledged ahead of {}", serial, expected);
                Err(OrderingViolation::OutOfOrder { serial, expected })
            }
            _ => {
                error!("Acknowledgement of unknown serial {}", serial);
                Err(OrderingViolation::UnknownSerial {
                    serial,
                    pending: self.pending_serials(),
                })
            }
        }
    }

    /// Checks that content may be attached now
    pub fn validate_content(&self) -> Result<(), OrderingViolation> {
        if let Some(pending) = self.pending.front() {
            return Err(OrderingViolation::UnackedConfigure(pending.serial));
        }
        if self.last_acked.is_none() {
            return Err(OrderingViolation::ContentBeforeConfigure);
        }
        Ok(())
    }

    pub fn last_acked(&self) -> Option<u32> {
        self.last_acked
    }

    pub fn acked_count(&self) -> u64 {
        self.acked_count
    }

    pub fn pending_serials(&self) -> Vec<u32> {
        self.pending.iter().map(|c| c.serial).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_configure_ack_flow() {
        let mut guard = ConfigureGuard::new();
        guard.record(100).unwrap();
        assert_eq!(guard.validate_content(), Err(OrderingViolation::UnackedConfigure(100)));

        guard.ack(100).unwrap();
        guard.validate_content().unwrap();
        assert_eq!(guard.last_acked(), Some(100));
        assert_eq!(guard.acked_count(), 1);
    }

    #[test]
    fn test_content_before_configure() {
        let guard = ConfigureGuard::new();
        assert_eq!(guard.validate_content(), Err(OrderingViolation::ContentBeforeConfigure));
    }

    #[test]
    fn test_invalid_ack_serial() {
        let mut guard = ConfigureGuard::new();
        guard.record(100).unwrap();
        assert_eq!(
            guard.ack(999),
            Err(OrderingViolation::UnknownSerial {
                serial: 999,
                pending: vec![100]
            })
        );
    }

    #[test]
    fn test_double_ack_rejected() {
        let mut guard = ConfigureGuard::new();
        guard.record(3).unwrap();
        guard.ack(3).unwrap();
        assert!(matches!(guard.ack(3), Err(OrderingViolation::UnknownSerial { .. })));
    }

    #[test]
    fn test_out_of_order_ack() {
        let mut guard = ConfigureGuard::new();
        guard.record(1).unwrap();
        guard.record(2).unwrap();
        assert_eq!(
            guard.ack(2),
            Err(OrderingViolation::OutOfOrder {
                serial: 2,
                expected: 1
            })
        );
        guard.ack(1).unwrap();
        guard.ack(2).unwrap();
        assert!(guard.pending_serials().is_empty());
    }

    #[test]
    fn test_duplicate_serial() {
        let mut guard = ConfigureGuard::new();
        guard.record(9).unwrap();
        assert_eq!(guard.record(9), Err(OrderingViolation::DuplicateSerial(9)));
        guard.ack(9).unwrap();
        assert_eq!(guard.record(9), Err(OrderingViolation::DuplicateSerial(9)));
    }
}
