//! `gridnav-planning` – offline policy computation.
//!
//! # Modules
//!
//! - [`value_iteration`] – [`ValueIteration`][value_iteration::ValueIteration]:
//!   synchronous value-iteration solver that turns a
//!   [`GridModel`][gridnav_types::GridModel] and its stochastic action model
//!   into a [`PolicyMap`][value_iteration::PolicyMap].  The policy is computed
//!   once, before any sensing, and is read-only afterwards.

pub mod value_iteration;

pub use value_iteration::{PolicyMap, Solution, ValueIteration, ValueMap, solve};
