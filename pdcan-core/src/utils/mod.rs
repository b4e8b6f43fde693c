//! Utility re-exports and helper macros for the PD-over-CAN pipeline.
//!
//! - `connection`: CAN wire codec, serial frame decoding and the bridge node
//! - `controllers`: motor bank, periodic control loop and the controller node
//! - `math`: the PD control law
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod connection;
pub mod controllers;
pub mod math;

pub use connection::bridge::BridgeController;
pub use controllers::ControllerNode;
pub use embassy_time::{Duration, Instant};
pub use math::pd::PdController as pd;

#[doc(hidden)]
pub use static_cell;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::utils::static_cell::StaticCell<$t> =
            $crate::utils::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
