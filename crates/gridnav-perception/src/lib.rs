//! `gridnav-perception` – Localisation layer.
//!
//! Turns noisy temperature and texture readings plus the robot's own motion
//! commands into a probability distribution over grid cells.
//!
//! # Modules
//!
//! - [`sensor_model`] – [`SensorModels`][sensor_model::SensorModels]: the
//!   Gaussian temperature model, the texture match model and the motion
//!   success model, all read-only after configuration.
//! - [`belief`] – [`BeliefFilter`][belief::BeliefFilter]: recursive discrete
//!   Bayes filter with temperature, texture and motion updates and a MAP
//!   estimate.

pub mod belief;
pub mod sensor_model;

pub use belief::BeliefFilter;
pub use sensor_model::SensorModels;
