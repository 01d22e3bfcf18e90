//! Simulated world for headless runs and tests.
//!
//! [`SimWorld`] holds the robot's true cell and a seeded RNG.  It produces
//! noisy temperature readings, unreliable texture readings and unreliable
//! moves using the same noise parameters the belief filter assumes.
//! [`SimDevices`] hands out the three device drivers, all sharing one world.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gridnav_hal::device::{MoveExecutor, TemperatureSensor, TextureSensor};
//! use gridnav_hal::sim::{SimDevices, SimWorld};
//! use gridnav_types::{Cell, Direction, GridConfig, GridModel};
//!
//! let config = GridConfig::default();
//! let grid = Arc::new(GridModel::from_config(&config).unwrap());
//! let world = SimWorld::new(grid, Cell::from(config.start), &config.sensing, 7).unwrap();
//! let mut devices = SimDevices::new(world);
//!
//! let _t = devices.temperature.read_temperature().unwrap();
//! let _x = devices.texture.read_texture().unwrap();
//! devices.mover.execute(Direction::E.vector()).unwrap();
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use gridnav_types::{Cell, Direction, GridModel, GridNavError, MoveVector, SensingSettings};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::device::{MoveExecutor, TemperatureSensor, TextureSensor};

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// Ground truth of a simulated run.
#[derive(Debug)]
pub struct SimWorld {
    grid: Arc<GridModel>,
    position: Cell,
    settings: SensingSettings,
    noise: Normal<f64>,
    rng: ChaCha8Rng,
    moves_requested: usize,
}

impl SimWorld {
    /// Place the robot at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] when `start` is outside the grid or
    /// blocked, or a probability/noise parameter is unusable.
    pub fn new(
        grid: Arc<GridModel>,
        start: Cell,
        settings: &SensingSettings,
        seed: u64,
    ) -> Result<Self, GridNavError> {
        if !grid.contains(start) || grid.kind(start).is_blocked() {
            return Err(GridNavError::Config(format!(
                "simulation start {start} is not an open cell"
            )));
        }
        for (name, p) in [
            ("prob_tex_correct", settings.prob_tex_correct),
            ("prob_move_correct", settings.prob_move_correct),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(GridNavError::Config(format!("{name} must lie in [0, 1], got {p}")));
            }
        }
        let noise = Normal::new(0.0, settings.temp_noise_std_dev).map_err(|e| {
            GridNavError::Config(format!("invalid temperature noise: {e}"))
        })?;
        Ok(Self {
            grid,
            position: start,
            settings: *settings,
            noise,
            rng: ChaCha8Rng::seed_from_u64(seed),
            moves_requested: 0,
        })
    }

    /// The robot's true cell.
    pub fn position(&self) -> Cell {
        self.position
    }

    pub fn moves_requested(&self) -> usize {
        self.moves_requested
    }

    /// Terrain mean of the true cell plus Gaussian noise.
    pub fn sample_temperature(&mut self) -> Result<f64, GridNavError> {
        let terrain = self
            .grid
            .terrain(self.position)
            .ok_or_else(|| self.lost("temperature"))?;
        Ok(self.settings.temperature_means.mean(terrain) + self.noise.sample(&mut self.rng))
    }

    /// True texture with probability `prob_tex_correct`, otherwise a
    /// different label drawn uniformly from the grid's alphabet.
    pub fn sample_texture(&mut self) -> Result<String, GridNavError> {
        let truth = self
            .grid
            .texture(self.position)
            .ok_or_else(|| self.lost("texture"))?
            .to_string();
        if self.rng.gen_bool(self.settings.prob_tex_correct) {
            return Ok(truth);
        }
        let others: Vec<&str> = self
            .grid
            .texture_alphabet()
            .into_iter()
            .filter(|l| *l != truth)
            .collect();
        if others.is_empty() {
            return Ok(truth);
        }
        Ok(others[self.rng.gen_range(0..others.len())].to_string())
    }

    /// Carry out a move request.  The robot moves with probability
    /// `prob_move_correct`; a move into a wall, a pit or off the grid leaves
    /// it in place.
    ///
    /// # Errors
    ///
    /// Rejects anything other than a cardinal unit vector.
    pub fn apply_move(&mut self, mv: MoveVector) -> Result<Cell, GridNavError> {
        if Direction::from_vector(mv).is_none() {
            return Err(GridNavError::ExternalRequest {
                service: "move".to_string(),
                details: format!("unsupported move vector {mv:?}"),
            });
        }
        self.moves_requested += 1;
        if self.rng.gen_bool(self.settings.prob_move_correct)
            && let Some(next) = self.grid.step(self.position, mv)
            && !self.grid.kind(next).is_blocked()
        {
            self.position = next;
        }
        debug!(position = %self.position, "simulated move applied");
        Ok(self.position)
    }

    fn lost(&self, service: &str) -> GridNavError {
        GridNavError::ExternalRequest {
            service: service.to_string(),
            details: format!("simulated robot at {} is outside the grid", self.position),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drivers
// ────────────────────────────────────────────────────────────────────────────

/// A [`SimWorld`] shared between the simulated drivers.
pub type SharedWorld = Arc<Mutex<SimWorld>>;

fn lock<'a>(world: &'a SharedWorld, service: &str) -> Result<MutexGuard<'a, SimWorld>, GridNavError> {
    world.lock().map_err(|_| GridNavError::ExternalRequest {
        service: service.to_string(),
        details: "simulated world lock poisoned".to_string(),
    })
}

/// Simulated temperature sensor.
pub struct SimTemperatureSensor {
    world: SharedWorld,
}

impl TemperatureSensor for SimTemperatureSensor {
    fn id(&self) -> &str {
        "sim_temp_sensor"
    }

    fn read_temperature(&mut self) -> Result<f64, GridNavError> {
        lock(&self.world, self.id())?.sample_temperature()
    }
}

/// Simulated texture service.
pub struct SimTextureSensor {
    world: SharedWorld,
}

impl TextureSensor for SimTextureSensor {
    fn id(&self) -> &str {
        "sim_texture"
    }

    fn read_texture(&mut self) -> Result<String, GridNavError> {
        lock(&self.world, self.id())?.sample_texture()
    }
}

/// Simulated move service.
pub struct SimMoveExecutor {
    world: SharedWorld,
}

impl MoveExecutor for SimMoveExecutor {
    fn id(&self) -> &str {
        "sim_move"
    }

    fn execute(&mut self, mv: MoveVector) -> Result<(), GridNavError> {
        lock(&self.world, self.id())?.apply_move(mv).map(|_| ())
    }
}

/// The three simulated drivers plus a handle on the shared world.
pub struct SimDevices {
    pub world: SharedWorld,
    pub temperature: SimTemperatureSensor,
    pub texture: SimTextureSensor,
    pub mover: SimMoveExecutor,
}

impl SimDevices {
    pub fn new(world: SimWorld) -> Self {
        let world = Arc::new(Mutex::new(world));
        Self {
            temperature: SimTemperatureSensor {
                world: Arc::clone(&world),
            },
            texture: SimTextureSensor {
                world: Arc::clone(&world),
            },
            mover: SimMoveExecutor {
                world: Arc::clone(&world),
            },
            world,
        }
    }

    /// The robot's true cell.
    pub fn true_position(&self) -> Result<Cell, GridNavError> {
        true_position(&self.world)
    }
}

/// The robot's true cell in a shared world.
pub fn true_position(world: &SharedWorld) -> Result<Cell, GridNavError> {
    Ok(lock(world, "sim_world")?.position())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
