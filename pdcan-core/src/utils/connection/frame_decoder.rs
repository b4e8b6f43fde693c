//! Sentinel-delimited frame parser for the bridge's serial link.
//!
//! A frame on the wire is exactly 21 bytes:
//!
//! ```text
//! 's' 't' | tag:u8 | m1:f32 | m2:f32 | m3:f32 | m4:f32 | 'e' 'n'
//! ```
//!
//! Floats are little-endian. The sentinels must sit at the exact start and end
//! of the frame; an `'e'` or `'n'` byte inside the payload does not end it.

use heapless::Vec;

use crate::utils::controllers::motor_bank::MOTOR_COUNT;

/// Start sentinel.
pub const START: [u8; 2] = *b"st";
/// End sentinel.
pub const END: [u8; 2] = *b"en";
/// Tag byte plus four `f32` fields, no padding.
pub const PAYLOAD_LEN: usize = 1 + 4 * MOTOR_COUNT;
/// Full frame including both sentinels.
pub const FRAME_LEN: usize = START.len() + PAYLOAD_LEN + END.len();
/// Hard cap on buffered bytes.
pub const BUFFER_CAP: usize = 128;

/// Motor command carried by one serial frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedCommand {
    pub tag: u8,
    /// Requested power per motor, nominally in `[-1.0, 1.0]`.
    pub motor_fraction: [f32; MOTOR_COUNT],
}

/// Reasons a buffered frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// More than [`BUFFER_CAP`] bytes accumulated.
    Overflow,
    /// The buffer does not begin with `"st"`.
    MissingStart,
    /// A full-length frame does not end with `"en"`.
    MissingEnd,
    /// Payload length differs from the wire layout.
    SizeMismatch { expected: usize, actual: usize },
}

/// Outcome of pushing one byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameStatus {
    Ready(DecodedCommand),
    /// Valid so far; waiting for more bytes.
    Incomplete,
    Rejected(FrameError),
}

/// Interpret a payload field by field.
///
/// The length is checked before any byte is read.
pub fn decode_payload(payload: &[u8]) -> Result<DecodedCommand, FrameError> {
    if payload.len() != PAYLOAD_LEN {
        return Err(FrameError::SizeMismatch {
            expected: PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let mut motor_fraction = [0.0f32; MOTOR_COUNT];
    for (value, chunk) in motor_fraction.iter_mut().zip(payload[1..].chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    Ok(DecodedCommand {
        tag: payload[0],
        motor_fraction,
    })
}

/// Serialize `command` into a complete wire frame.
pub fn encode_frame(command: &DecodedCommand) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[..2].copy_from_slice(&START);
    out[2] = command.tag;
    for (chunk, value) in out[3..FRAME_LEN - 2]
        .chunks_exact_mut(4)
        .zip(command.motor_fraction)
    {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    out[FRAME_LEN - 2..].copy_from_slice(&END);
    out
}

/// Accumulates serial bytes and extracts [`DecodedCommand`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8, BUFFER_CAP>,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Process a single incoming byte.
    pub fn push(&mut self, byte: u8) -> FrameStatus {
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return FrameStatus::Rejected(FrameError::Overflow);
        }

        let len = self.buf.len();
        if len <= START.len() && self.buf[len - 1] != START[len - 1] {
            self.resync();
            return FrameStatus::Rejected(FrameError::MissingStart);
        }
        if len < FRAME_LEN {
            return FrameStatus::Incomplete;
        }

        if self.buf[FRAME_LEN - END.len()..] != END {
            self.resync();
            return FrameStatus::Rejected(FrameError::MissingEnd);
        }

        let status = match decode_payload(&self.buf[START.len()..FRAME_LEN - END.len()]) {
            Ok(command) => FrameStatus::Ready(command),
            Err(e) => FrameStatus::Rejected(e),
        };
        self.buf.clear();
        status
    }

    /// Push every byte of `chunk`, yielding one status per byte.
    pub fn feed<'a>(&'a mut self, chunk: &'a [u8]) -> impl Iterator<Item = FrameStatus> + 'a {
        chunk.iter().map(move |&b| self.push(b))
    }

    /// Bytes accumulated toward the current frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Drop the rejected frame, keeping the earliest later bytes that could still
    /// begin a valid one.
    fn resync(&mut self) {
        let len = self.buf.len();
        let restart = (1..len)
            .find(|&i| self.buf[i] == START[0] && (i + 1 == len || self.buf[i + 1] == START[1]))
            .unwrap_or(len);
        self.buf.rotate_left(restart);
        self.buf.truncate(len - restart);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMD: DecodedCommand = DecodedCommand {
        tag: 0x2A,
        motor_fraction: [0.5, -0.25, 1.0, 0.0],
    };

    #[test]
    fn test_layout_constants() {
        assert_eq!(PAYLOAD_LEN, 17);
        assert_eq!(FRAME_LEN, 21);
    }

    #[test]
    fn test_whole_frame_decodes() {
        let mut decoder = FrameDecoder::new();
        let frame = encode_frame(&CMD);
        let (last, rest) = frame.split_last().unwrap();
        for &b in rest {
            assert_eq!(decoder.push(b), FrameStatus::Incomplete);
        }
        assert_eq!(decoder.push(*last), FrameStatus::Ready(CMD));
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn test_missing_t_clears_buffer() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(b's'), FrameStatus::Incomplete);
        assert_eq!(
            decoder.push(b'x'),
            FrameStatus::Rejected(FrameError::MissingStart)
        );
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn test_bytes_without_sentinels_never_accumulate() {
        let mut decoder = FrameDecoder::new();
        for _ in 0..129 {
            decoder.push(b'x');
        }
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn test_sentinel_bytes_inside_payload_do_not_end_frame() {
        let mut decoder = FrameDecoder::new();
        let mut frame = encode_frame(&CMD);
        frame[2] = b'e';
        frame[3] = b'n';
        let statuses = decoder.feed(&frame[..FRAME_LEN - 1]);
        assert!(statuses.into_iter().all(|s| s == FrameStatus::Incomplete));
        match decoder.push(frame[FRAME_LEN - 1]) {
            FrameStatus::Ready(cmd) => assert_eq!(cmd.tag, b'e'),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_terminator_resyncs_on_embedded_start() {
        let mut decoder = FrameDecoder::new();
        let mut frame = encode_frame(&CMD);
        frame[FRAME_LEN - 2] = b's';
        frame[FRAME_LEN - 1] = b't';
        let last = decoder.feed(&frame).last();
        assert_eq!(last, Some(FrameStatus::Rejected(FrameError::MissingEnd)));
        assert_eq!(decoder.buffered(), b"st");
    }

    #[test]
    fn test_payload_length_is_checked() {
        assert_eq!(
            decode_payload(&[0; 16]),
            Err(FrameError::SizeMismatch {
                expected: 17,
                actual: 16
            })
        );
    }
}
