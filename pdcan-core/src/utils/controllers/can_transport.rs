//! CAN transport of the controller node.
//!
//! Receives setpoint and encoder frames into the shared motor bank, and sends the
//! power report whenever the control loop has produced one.

use embedded_can::{nb::Can, Error as _};

use super::control_loop::ControlShared;
use super::motor_bank::PowerReport;
use crate::utils::connection::wire::{self, Inbound, POWER_REPORT_ID};

/// Counters kept by the transport. Nothing here is reported on the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub setpoints: u32,
    pub feedback: u32,
    /// Frames with an unknown id, an extended id, a remote request or a short payload.
    pub ignored: u32,
    pub receive_errors: u32,
    pub reports_sent: u32,
    /// Reports dropped because every transmit mailbox was busy.
    pub dropped_reports: u32,
    pub transmit_errors: u32,
}

/// Result of sending a power report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitOutcome {
    Sent,
    /// The report was discarded; a fresh one follows on the next tick.
    Dropped,
}

/// Owns the controller node's CAN handle.
pub struct CanTransport<C> {
    bus: C,
    stats: TransportStats,
}

impl<C> CanTransport<C>
where
    C: Can,
{
    pub fn new(bus: C) -> Self {
        Self {
            bus,
            stats: TransportStats::default(),
        }
    }

    /// Poll for one frame and apply it to the bank.
    ///
    /// Returns the recognised frame, or `None` when nothing arrived or the frame
    /// was ignored.
    pub fn poll_receive(&mut self, shared: &ControlShared) -> Option<Inbound> {
        let frame = match self.bus.receive() {
            Ok(frame) => frame,
            Err(nb::Error::WouldBlock) => return None,
            Err(nb::Error::Other(e)) => {
                self.stats.receive_errors = self.stats.receive_errors.wrapping_add(1);
                tracing::warn!(kind = ?e.kind(), "CAN receive error");
                return None;
            }
        };

        let Some(inbound) = wire::classify(&frame) else {
            self.stats.ignored = self.stats.ignored.wrapping_add(1);
            return None;
        };

        match inbound {
            Inbound::Setpoints(targets) => {
                shared.with_bank(|bank| bank.set_targets(targets));
                self.stats.setpoints = self.stats.setpoints.wrapping_add(1);
                tracing::info!(
                    "m1:{},m2:{},m3:{},m4:{}",
                    targets[0],
                    targets[1],
                    targets[2],
                    targets[3]
                );
            }
            Inbound::Feedback { slot, speed } => {
                shared.with_bank(|bank| bank.set_measured(slot, speed));
                self.stats.feedback = self.stats.feedback.wrapping_add(1);
            }
        }
        Some(inbound)
    }

    /// Send `report` as a `0x200` frame.
    ///
    /// Failed sends are dropped, not retried: the control loop publishes a newer
    /// report within one period.
    pub fn send_report(&mut self, report: PowerReport) -> TransmitOutcome {
        let Some(frame) = wire::quad_frame::<C::Frame>(POWER_REPORT_ID, report) else {
            self.stats.transmit_errors = self.stats.transmit_errors.wrapping_add(1);
            return TransmitOutcome::Dropped;
        };

        match self.bus.transmit(&frame) {
            Ok(_displaced) => {
                self.stats.reports_sent = self.stats.reports_sent.wrapping_add(1);
                TransmitOutcome::Sent
            }
            Err(nb::Error::WouldBlock) => {
                self.stats.dropped_reports = self.stats.dropped_reports.wrapping_add(1);
                tracing::trace!("transmit mailboxes full, power report dropped");
                TransmitOutcome::Dropped
            }
            Err(nb::Error::Other(e)) => {
                self.stats.transmit_errors = self.stats.transmit_errors.wrapping_add(1);
                tracing::warn!(kind = ?e.kind(), "CAN transmit error, power report dropped");
                TransmitOutcome::Dropped
            }
        }
    }

    /// Send the pending report, if any, clearing the pending state either way.
    pub fn flush_pending(&mut self, shared: &ControlShared) -> Option<TransmitOutcome> {
        shared.take_report().map(|report| self.send_report(report))
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn bus(&mut self) -> &mut C {
        &mut self.bus
    }

    /// Give back the CAN handle.
    pub fn free(self) -> C {
        self.bus
    }
}
