//! `gridnav-middleware` – event transport.
//!
//! Carries the policy, per-cycle telemetry and lifecycle notices from the
//! control loop to whoever listens (CLI output, recorders, tests) without the
//! core knowing who they are.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
