//! In-memory CAN and serial doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;

use embedded_can::{nb::Can, ErrorKind, Frame, Id, StandardId};
use pdcan_core::utils::connection::frame_decoder::{encode_frame, DecodedCommand};

/// Data or remote frame held on the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFrame {
    id: Id,
    data: Vec<u8>,
    remote: bool,
}

impl Frame for MockFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        Some(MockFrame {
            id: id.into(),
            data: data.to_vec(),
            remote: false,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(MockFrame {
            id: id.into(),
            data: vec![0; dlc],
            remote: true,
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data
        }
    }
}

/// Build a standard data frame.
pub fn frame(id: u16, data: &[u8]) -> MockFrame {
    MockFrame::new(StandardId::new(id).unwrap(), data).unwrap()
}

/// Raw standard id of a frame.
pub fn raw_id(frame: &MockFrame) -> u16 {
    match frame.id() {
        Id::Standard(id) => id.as_raw(),
        Id::Extended(id) => panic!("unexpected extended id {:?}", id),
    }
}

/// Encoder feedback frame for the motor answering on `id`.
pub fn feedback(id: u16, speed: i16) -> MockFrame {
    let [hi, lo] = speed.to_be_bytes();
    frame(id, &[0, 0, hi, lo, 0, 0, 0, 0])
}

/// CAN controller double: frames in `rx` are received in order, transmitted
/// frames land in `tx`.
#[derive(Debug, Default)]
pub struct MockBus {
    pub rx: VecDeque<MockFrame>,
    pub tx: Vec<MockFrame>,
    /// Reject transmits with `WouldBlock` while set.
    pub mailboxes_full: bool,
    /// Reject transmits with a bus error while set.
    pub tx_error: Option<ErrorKind>,
    /// Number of upcoming receives that fail with an overrun.
    pub rx_errors: usize,
}

impl MockBus {
    pub fn with_rx(frames: impl IntoIterator<Item = MockFrame>) -> Self {
        MockBus {
            rx: frames.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl Can for MockBus {
    type Frame = MockFrame;
    type Error = ErrorKind;

    fn transmit(&mut self, frame: &MockFrame) -> nb::Result<Option<MockFrame>, ErrorKind> {
        if let Some(kind) = self.tx_error {
            return Err(nb::Error::Other(kind));
        }
        if self.mailboxes_full {
            return Err(nb::Error::WouldBlock);
        }
        self.tx.push(frame.clone());
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<MockFrame, ErrorKind> {
        if self.rx_errors > 0 {
            self.rx_errors -= 1;
            return Err(nb::Error::Other(ErrorKind::Overrun));
        }
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Serial port double that hands out pre-queued chunks.
#[derive(Debug, Default)]
pub struct MockSerial {
    pub chunks: VecDeque<Vec<u8>>,
}

impl MockSerial {
    pub fn with_chunks(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        MockSerial {
            chunks: chunks.into_iter().collect(),
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = Infallible;
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.chunks.is_empty())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

/// Complete serial frame for the given fractions.
pub fn serial_frame(tag: u8, motor_fraction: [f32; 4]) -> Vec<u8> {
    encode_frame(&DecodedCommand {
        tag,
        motor_fraction,
    })
    .to_vec()
}
