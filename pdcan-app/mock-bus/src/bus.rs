//! In-process stand-ins for the CAN bus and the bridge's serial link.

use core::cell::RefCell;
use std::convert::Infallible;

use embassy_sync::{
    blocking_mutex::{Mutex, raw::CriticalSectionRawMutex},
    pipe::Pipe,
};
use embedded_can::{ErrorKind, Frame, Id};
use heapless::{Deque, Vec};

/// Frames buffered per receiving node before new ones are lost.
const QUEUE_DEPTH: usize = 64;

/// Nodes attached to the virtual bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    Bridge = 0,
    Controller = 1,
    Plant = 2,
}

const NODE_COUNT: usize = 3;

/// Classic CAN data or remote frame.
#[derive(Debug, Clone)]
pub struct SimFrame {
    id: Id,
    data: Vec<u8, 8>,
    remote: bool,
}

impl Frame for SimFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Some(SimFrame {
            id: id.into(),
            data: Vec::from_slice(data).ok()?,
            remote: false,
        })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        let mut data = Vec::new();
        data.resize(dlc, 0).ok()?;
        Some(SimFrame {
            id: id.into(),
            data,
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
        if self.remote { &[] } else { &self.data }
    }
}

struct BusState {
    queues: [Deque<SimFrame, QUEUE_DEPTH>; NODE_COUNT],
    lost: u32,
}

static BUS: Mutex<CriticalSectionRawMutex, RefCell<BusState>> =
    Mutex::new(RefCell::new(BusState {
        queues: [Deque::new(), Deque::new(), Deque::new()],
        lost: 0,
    }));

/// Frames that could not be delivered because a receive queue was full.
pub fn lost_frames() -> u32 {
    BUS.lock(|bus| bus.borrow().lost)
}

/// One node's handle on the virtual bus. A transmitted frame is delivered to
/// every other node.
pub struct BusPort {
    node: NodeId,
}

impl BusPort {
    pub fn new(node: NodeId) -> Self {
        BusPort { node }
    }
}

impl embedded_can::nb::Can for BusPort {
    type Frame = SimFrame;
    type Error = ErrorKind;

    fn transmit(&mut self, frame: &SimFrame) -> nb::Result<Option<SimFrame>, ErrorKind> {
        BUS.lock(|bus| {
            let mut bus = bus.borrow_mut();
            for node in 0..NODE_COUNT {
                if node == self.node as usize {
                    continue;
                }
                if bus.queues[node].push_back(frame.clone()).is_err() {
                    bus.lost = bus.lost.wrapping_add(1);
                }
            }
        });
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<SimFrame, ErrorKind> {
        BUS.lock(|bus| bus.borrow_mut().queues[self.node as usize].pop_front())
            .ok_or(nb::Error::WouldBlock)
    }
}

/// Byte pipe standing in for the host-to-bridge UART.
pub type SerialLink = Pipe<CriticalSectionRawMutex, 256>;

/// Bridge-side end of a [`SerialLink`], handing out at most `chunk` bytes per read.
pub struct PipeSerial {
    link: &'static SerialLink,
    chunk: usize,
}

impl PipeSerial {
    pub fn new(link: &'static SerialLink, chunk: usize) -> Self {
        PipeSerial {
            link,
            chunk: chunk.max(1),
        }
    }
}

impl embedded_io::ErrorType for PipeSerial {
    type Error = Infallible;
}

impl embedded_io::ReadReady for PipeSerial {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.link.is_empty())
    }
}

impl embedded_io::Read for PipeSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let n = self.chunk.min(buf.len());
        Ok(self.link.try_read(&mut buf[..n]).unwrap_or(0))
    }
}
