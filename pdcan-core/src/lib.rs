//! Core control and protocol logic for the two-node PD-over-CAN motor pipeline.
//!
//! The crate is hardware-agnostic: buses are reached through `embedded-can` and
//! `embedded-io` traits. For a host simulation of both nodes, see `pdcan-app/mock-bus`.
#![no_std]

pub mod config;
pub mod utils;
