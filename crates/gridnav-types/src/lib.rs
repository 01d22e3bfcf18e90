//! `gridnav-types` – shared vocabulary of the gridnav workspace.
//!
//! - [`grid`] – cells, move vectors, directions, policy labels and the
//!   immutable [`GridModel`].
//! - [`config`] – the [`GridConfig`] input document and its validation.
//! - Event envelopes published on the bus and the workspace-wide
//!   [`GridNavError`].

pub mod config;
pub mod grid;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use config::{
    ActionProbabilities, GridConfig, Rewards, SensingSettings, SolverSettings, TemperatureMeans,
};
pub use grid::{Cell, CellKind, Direction, GridModel, MoveVector, PolicyLabel, Terrain};

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"gridnav-runtime::control_loop"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum EventPayload {
    /// The solved policy, row-major, published once before sensing starts.
    PolicyComputed {
        rows: usize,
        cols: usize,
        policy: Vec<PolicyLabel>,
        sweeps: usize,
        converged: bool,
    },
    Telemetry(TelemetrySnapshot),
    /// A cycle ended without a move because the policy at the estimate is
    /// not a direction.
    CycleStalled { estimate: Cell, label: PolicyLabel },
    Completed(Completion),
}

/// Per-cycle telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub temperature: f64,
    pub texture: String,
    /// Normalised belief, row-major.
    pub belief: Vec<f64>,
    pub position: Option<Cell>,
}

/// Payload of the one-shot completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub goal: Cell,
    pub probability: f64,
    /// Temperature events processed, including the final one.
    pub cycles: u64,
}

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridNavError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Degenerate Belief: total mass is zero after {operation}")]
    DegenerateBelief { operation: String },

    #[error("External Request Failed on {service}: {details}")]
    ExternalRequest { service: String, details: String },

    #[error("Event Bus Error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_event_roundtrip() {
        let event = Event::new(
            "gridnav-runtime::control_loop",
            EventPayload::Telemetry(TelemetrySnapshot {
                temperature: 39.5,
                texture: "R".to_string(),
                belief: vec![0.25, 0.75],
                position: Some(Cell::new(0, 1)),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        match back.payload {
            EventPayload::Telemetry(t) => {
                assert_eq!(t.position, Some(Cell::new(0, 1)));
                assert!((t.belief[1] - 0.75).abs() < 1e-12);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn policy_event_serializes_labels_as_symbols() {
        let event = Event::new(
            "test",
            EventPayload::PolicyComputed {
                rows: 1,
                cols: 2,
                policy: vec![PolicyLabel::Move(Direction::E), PolicyLabel::Goal],
                sweeps: 3,
                converged: true,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#"["E","GOAL"]"#));
    }

    #[test]
    fn error_display() {
        let err = GridNavError::DegenerateBelief {
            operation: "temperature update".to_string(),
        };
        assert!(err.to_string().contains("temperature update"));

        let err = GridNavError::ExternalRequest {
            service: "texture".to_string(),
            details: "timeout".to_string(),
        };
        assert!(err.to_string().contains("texture"));
    }
}
