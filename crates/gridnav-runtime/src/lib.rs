//! `gridnav-runtime` – the decision loop that ties planning, perception and
//! devices together.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: one
//!   localise/select/act cycle per temperature reading, with telemetry and
//!   lifecycle events on the bus and a one-shot completion signal.
//! - [`boost`] – [`ConfidenceBoost`][boost::ConfidenceBoost]: optional
//!   post-motion reweighting of the intended destination.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod boost;
pub mod control_loop;
pub mod telemetry;

pub use boost::ConfidenceBoost;
pub use control_loop::{ControlLoop, CycleOutcome, LoopSettings, LoopState, RunSummary};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
