//! Bridge node: serial motor commands in, CAN setpoint frames out.
//!
//! Every decoded serial frame produces exactly one `0x199` frame. There is no
//! batching or deduplication.

use core::fmt;

use embedded_can::{nb::Can, Error as _};
use embedded_io::{Read, ReadReady};

use super::frame_decoder::{DecodedCommand, FrameDecoder, FrameStatus, BUFFER_CAP};
use super::wire::{self, SETPOINT_ID};
use crate::utils::controllers::{TransmitOutcome, MOTOR_COUNT};

/// Setpoint units per unit of motor fraction.
pub const SETPOINT_SCALE: f32 = 5000.0;

/// Convert a motor fraction into setpoint units.
///
/// The fraction is clamped to `[-1.0, 1.0]` and the product truncated toward
/// zero, so the result is always in `[-5000, 5000]`. NaN maps to 0.
pub fn fraction_to_setpoint(fraction: f32) -> i16 {
    (fraction.clamp(-1.0, 1.0) * SETPOINT_SCALE) as i16
}

/// Setpoints for every motor of a decoded command.
pub fn setpoints(command: &DecodedCommand) -> [i16; MOTOR_COUNT] {
    command.motor_fraction.map(fraction_to_setpoint)
}

/// Errors surfaced by [`BridgeController::poll`].
#[derive(Debug)]
pub enum BridgeError<E: fmt::Debug> {
    Serial(E),
}

impl<E: fmt::Debug> fmt::Display for BridgeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Serial(e) => write!(f, "serial read failed: {:?}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub forwarded: u32,
    /// Buffered frames discarded by the decoder.
    pub rejected: u32,
    pub dropped: u32,
    pub transmit_errors: u32,
}

/// Owns the bridge node's serial and CAN handles.
pub struct BridgeController<C, S> {
    can: C,
    serial: S,
    decoder: FrameDecoder,
    stats: BridgeStats,
}

impl<C, S> BridgeController<C, S>
where
    C: Can,
{
    pub fn new(can: C, serial: S) -> Self {
        Self {
            can,
            serial,
            decoder: FrameDecoder::new(),
            stats: BridgeStats::default(),
        }
    }

    /// Feed newly arrived serial bytes.
    ///
    /// Returns how many setpoint frames were put on the bus.
    pub fn on_bytes(&mut self, chunk: &[u8]) -> usize {
        let mut sent = 0;
        for &byte in chunk {
            match self.decoder.push(byte) {
                FrameStatus::Ready(command) => {
                    if self.forward(&command) == TransmitOutcome::Sent {
                        sent += 1;
                    }
                }
                FrameStatus::Rejected(reason) => {
                    self.stats.rejected = self.stats.rejected.wrapping_add(1);
                    tracing::trace!(?reason, "serial frame discarded");
                }
                FrameStatus::Incomplete => {}
            }
        }
        sent
    }

    /// Broadcast the setpoints of `command`.
    pub fn forward(&mut self, command: &DecodedCommand) -> TransmitOutcome {
        let targets = setpoints(command);
        tracing::debug!(tag = command.tag, ?targets, "forwarding setpoints");

        let Some(frame) = wire::quad_frame::<C::Frame>(SETPOINT_ID, targets) else {
            self.stats.transmit_errors = self.stats.transmit_errors.wrapping_add(1);
            return TransmitOutcome::Dropped;
        };

        match self.can.transmit(&frame) {
            Ok(_) => {
                self.stats.forwarded = self.stats.forwarded.wrapping_add(1);
                TransmitOutcome::Sent
            }
            Err(nb::Error::WouldBlock) => {
                self.stats.dropped = self.stats.dropped.wrapping_add(1);
                tracing::warn!("transmit mailboxes full, setpoint frame dropped");
                TransmitOutcome::Dropped
            }
            Err(nb::Error::Other(e)) => {
                self.stats.transmit_errors = self.stats.transmit_errors.wrapping_add(1);
                tracing::warn!(kind = ?e.kind(), "CAN transmit error, setpoint frame dropped");
                TransmitOutcome::Dropped
            }
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn can(&mut self) -> &mut C {
        &mut self.can
    }

    pub fn serial(&mut self) -> &mut S {
        &mut self.serial
    }
}

impl<C, S> BridgeController<C, S>
where
    C: Can,
    S: Read + ReadReady,
{
    /// Read whatever the serial port has buffered, without blocking.
    pub fn poll(&mut self) -> Result<usize, BridgeError<S::Error>> {
        if !self.serial.read_ready().map_err(BridgeError::Serial)? {
            return Ok(0);
        }
        let mut buf = [0u8; BUFFER_CAP];
        let n = self.serial.read(&mut buf).map_err(BridgeError::Serial)?;
        Ok(self.on_bytes(&buf[..n]))
    }

    /// Poll forever, yielding to other tasks between reads.
    pub async fn run(&mut self) -> ! {
        tracing::info!("bridge node polling");
        loop {
            if let Err(error) = self.poll() {
                tracing::error!(%error, "bridge poll failed");
            }
            embassy_futures::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_saturates() {
        assert_eq!(fraction_to_setpoint(2.0), 5000);
        assert_eq!(fraction_to_setpoint(-3.5), -5000);
        assert_eq!(fraction_to_setpoint(0.5), 2500);
    }

    #[test]
    fn test_fraction_truncates_toward_zero() {
        assert_eq!(fraction_to_setpoint(0.00019), 0);
        assert_eq!(fraction_to_setpoint(-0.00039), -1);
    }

    #[test]
    fn test_nan_is_zero() {
        assert_eq!(fraction_to_setpoint(f32::NAN), 0);
    }
}
