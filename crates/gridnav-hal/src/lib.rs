//! `gridnav-hal` – device abstraction.
//!
//! # Modules
//!
//! - [`device`] – the [`TemperatureSensor`][device::TemperatureSensor],
//!   [`TextureSensor`][device::TextureSensor] and
//!   [`MoveExecutor`][device::MoveExecutor] traits the control loop drives.
//! - [`sim`] – [`SimWorld`][sim::SimWorld] and its drivers: a seeded
//!   stand-in for the physical robot so the full stack runs headless.

pub mod device;
pub mod sim;

pub use device::{MoveExecutor, TemperatureSensor, TextureSensor};
pub use sim::{SimDevices, SimWorld};
