// src/lib.rs

//! Frame-synchronized sensor telemetry over UART and CAN.
//!
//! This crate ingests telemetry from external sensor modules, a
//! time-of-flight distance module ([`sensor::tofsense`]) and a
//! battery-management system ([`sensor::daly`]), and turns raw, possibly
//! corrupted or partial byte/frame streams into validated, typed
//! measurements available to a polling consumer.
//!
//! The transport-facing half (the producer domain) is fed from interrupt or
//! callback context: a serial receive interrupt pushes single bytes into a
//! [`driver::UartReceiver`], a CAN receive callback pushes whole frames into
//! a [`driver::CanReceiver`]. The consumer half calls
//! [`driver::Device::fetch`] to request and wait for a fresh measurement and
//! [`driver::Device::get`] to read individual channels. The two halves meet
//! in a mutex-guarded shared record with condition-variable wakeups, so a
//! fetch never observes a partially written measurement and never blocks
//! past its configured timeout.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod common;
pub mod sensor;

#[cfg(feature = "std")]
pub mod driver;

// Re-export key types for convenience
pub use common::error::Error;
pub use common::types::{Channel, DeviceConfig, OperatingMode};
pub use sensor::SensorProtocol;
