//! CAN wire protocol shared by the bridge and controller nodes.
//!
//! All frames use standard 11-bit identifiers and 8-byte payloads made of
//! big-endian `i16` fields.
//!
//! | id | direction | payload |
//! |---|---|---|
//! | `0x199` | bridge -> controller | 4x target speed |
//! | `0x200` | controller -> telemetry | 4x drive power |
//! | `0x201..=0x204` | encoder -> controller | bytes 2-3: measured speed |

use embedded_can::{Frame, Id, StandardId};

use crate::utils::controllers::motor_bank::{MotorSlot, MOTOR_COUNT};

/// Setpoint broadcast carrying one target speed per motor.
pub const SETPOINT_ID: u16 = 0x199;
/// Power report carrying the drive power of every motor.
pub const POWER_REPORT_ID: u16 = 0x200;

/// Encoder feedback identifiers, one per motor slot.
pub const FEEDBACK_IDS: [(u16, MotorSlot); MOTOR_COUNT] = [
    (0x201, MotorSlot::M0),
    (0x202, MotorSlot::M1),
    (0x203, MotorSlot::M2),
    (0x204, MotorSlot::M3),
];

/// Payload length of every frame in the protocol.
pub const PAYLOAD_LEN: usize = 8;

/// Byte offset of the measured speed inside a feedback frame.
const FEEDBACK_SPEED_OFFSET: usize = 2;

/// A frame recognised by the controller node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// New target speeds for all motors (`0x199`).
    Setpoints([i16; MOTOR_COUNT]),
    /// Measured speed of one motor (`0x201..=0x204`).
    Feedback { slot: MotorSlot, speed: i16 },
}

/// Look up the motor slot that reports on `id`.
pub fn feedback_slot(id: u16) -> Option<MotorSlot> {
    FEEDBACK_IDS
        .iter()
        .find(|(raw, _)| *raw == id)
        .map(|&(_, slot)| slot)
}

/// Pack four values as big-endian pairs in slot order.
pub fn encode_quad(values: [i16; MOTOR_COUNT]) -> [u8; PAYLOAD_LEN] {
    let mut out = [0u8; PAYLOAD_LEN];
    for (chunk, value) in out.chunks_exact_mut(2).zip(values) {
        chunk.copy_from_slice(&value.to_be_bytes());
    }
    out
}

/// Unpack four big-endian pairs. Returns `None` for payloads shorter than 8 bytes.
pub fn decode_quad(data: &[u8]) -> Option<[i16; MOTOR_COUNT]> {
    let data = data.get(..PAYLOAD_LEN)?;
    let mut out = [0i16; MOTOR_COUNT];
    for (value, chunk) in out.iter_mut().zip(data.chunks_exact(2)) {
        *value = i16::from_be_bytes([chunk[0], chunk[1]]);
    }
    Some(out)
}

/// Classify a received frame.
///
/// Extended, remote and truncated frames are treated the same as unknown
/// identifiers and yield `None`.
pub fn classify<F: Frame>(frame: &F) -> Option<Inbound> {
    if frame.is_remote_frame() {
        return None;
    }
    let id = match frame.id() {
        Id::Standard(id) => id.as_raw(),
        Id::Extended(_) => return None,
    };

    if id == SETPOINT_ID {
        return decode_quad(frame.data()).map(Inbound::Setpoints);
    }

    let slot = feedback_slot(id)?;
    let bytes = frame
        .data()
        .get(FEEDBACK_SPEED_OFFSET..FEEDBACK_SPEED_OFFSET + 2)?;
    Some(Inbound::Feedback {
        slot,
        speed: i16::from_be_bytes([bytes[0], bytes[1]]),
    })
}

/// Build an 8-byte data frame carrying `values` under a standard `id`.
pub fn quad_frame<F: Frame>(id: u16, values: [i16; MOTOR_COUNT]) -> Option<F> {
    let id = StandardId::new(id)?;
    F::new(id, &encode_quad(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_big_endian_in_slot_order() {
        let bytes = encode_quad([0x0102, -1, 0, 16_300]);
        assert_eq!(bytes, [0x01, 0x02, 0xFF, 0xFF, 0x00, 0x00, 0x3F, 0xAC]);
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        assert_eq!(decode_quad(&[0; 7]), None);
    }

    #[test]
    fn test_feedback_table_covers_each_slot_once() {
        for (i, slot) in MotorSlot::ALL.iter().enumerate() {
            assert_eq!(feedback_slot(0x201 + i as u16), Some(*slot));
        }
        assert_eq!(feedback_slot(0x200), None);
        assert_eq!(feedback_slot(0x205), None);
    }
}
