//! Module Exports
//!
//! This file exports the modules that make up the controller node.
//!
//! - `motor_bank`: Four PD-controlled motor slots.
//! - `control_loop`: Fixed-period tick and the state it shares with the main
//!   loop.
//! - `can_transport`: Receive dispatch and power report transmission.

pub mod can_transport;
/// Module for the periodic control tick.
pub mod control_loop;
pub mod motor_bank;

use embedded_can::nb::Can;

pub use can_transport::{CanTransport, TransmitOutcome, TransportStats};
pub use control_loop::{ControlLoop, ControlShared, LoopStats};
pub use motor_bank::{MotorBank, MotorSlot, PowerReport, MOTOR_COUNT};

use crate::utils::connection::wire::Inbound;

/// What a single pass of the main loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub received: Option<Inbound>,
    pub transmitted: Option<TransmitOutcome>,
}

/// Main polling loop of the controller node.
///
/// Pairs the CAN transport with the state shared with the [`ControlLoop`].
pub struct ControllerNode<'a, C> {
    pub transport: CanTransport<C>,
    shared: &'a ControlShared,
}

impl<'a, C> ControllerNode<'a, C>
where
    C: Can,
{
    pub fn new(bus: C, shared: &'a ControlShared) -> Self {
        ControllerNode {
            transport: CanTransport::new(bus),
            shared,
        }
    }

    /// Receive at most one frame, then flush a pending power report.
    pub fn poll_once(&mut self) -> PollOutcome {
        let received = self.transport.poll_receive(self.shared);
        let transmitted = self.transport.flush_pending(self.shared);
        PollOutcome {
            received,
            transmitted,
        }
    }

    pub fn shared(&self) -> &'a ControlShared {
        self.shared
    }

    /// Poll forever, yielding to other tasks between passes.
    pub async fn run(&mut self) -> ! {
        tracing::info!("controller node polling");
        loop {
            self.poll_once();
            embassy_futures::yield_now().await;
        }
    }
}
