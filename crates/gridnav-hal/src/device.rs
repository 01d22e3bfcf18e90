//! Device traits the control loop talks to.
//!
//! Drivers (simulated or real) implement these traits; the runtime only ever
//! sees the trait objects, so transports can be swapped without touching the
//! filter or the policy.  Every call is synchronous and blocks the current
//! decision cycle until the device answers.

use gridnav_types::{GridNavError, MoveVector};

/// Source of temperature readings.  Each reading drives one decision cycle.
pub trait TemperatureSensor: Send {
    /// Stable identifier, e.g. `"temp_sensor"`.
    fn id(&self) -> &str;

    /// Block until the next reading is available.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::ExternalRequest`] when the sensor cannot be
    /// reached.
    fn read_temperature(&mut self) -> Result<f64, GridNavError>;
}

/// Texture query service, asked once per cycle.
pub trait TextureSensor: Send {
    fn id(&self) -> &str;

    /// Request one texture label.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::ExternalRequest`] when the request fails.
    fn read_texture(&mut self) -> Result<String, GridNavError>;
}

/// Move execution service.
pub trait MoveExecutor: Send {
    fn id(&self) -> &str;

    /// Ask the robot to move by `mv` and wait for completion.  Success means
    /// the request was carried out, not that the robot actually moved.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::ExternalRequest`] when the request is rejected
    /// or the service is unavailable.
    fn execute(&mut self, mv: MoveVector) -> Result<(), GridNavError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process executor used only for tests.
    struct RecordingExecutor {
        moves: Vec<MoveVector>,
    }

    impl MoveExecutor for RecordingExecutor {
        fn id(&self) -> &str {
            "recording"
        }

        fn execute(&mut self, mv: MoveVector) -> Result<(), GridNavError> {
            self.moves.push(mv);
            Ok(())
        }
    }

    #[test]
    fn executor_usable_as_trait_object() {
        let mut exec: Box<dyn MoveExecutor> = Box::new(RecordingExecutor { moves: Vec::new() });
        exec.execute(MoveVector::new(0, 1)).unwrap();
        exec.execute(MoveVector::new(1, 0)).unwrap();
        assert_eq!(exec.id(), "recording");
    }
}
