//! Math utilities for the PD-over-CAN pipeline.
//!
//! This module provides the integer PD control law applied to every motor slot.

pub mod pd;
