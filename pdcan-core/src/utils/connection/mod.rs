//! Module Exports
//!
//! This file exports the modules that move commands between the serial link and
//! the CAN bus.
//!
//! # Modules
//! - `wire`: CAN identifier table and the 8-byte big-endian payload codec.
//! - `frame_decoder`: Sentinel-delimited serial frame parser.
//! - `bridge`: Bridge node translating serial commands into CAN setpoints.

pub mod bridge;
/// Module for parsing untrusted serial bytes into typed commands.
pub mod frame_decoder;
pub mod wire;

pub use bridge::BridgeController;
pub use frame_decoder::{DecodedCommand, FrameDecoder, FrameError, FrameStatus};
