//! Grid configuration schema.
//!
//! [`GridConfig`] is the single input document for a run: world layout,
//! action model, rewards, solver settings and sensor noise.  It is usually
//! parsed from TOML with [`GridConfig::from_toml_str`] and must pass
//! [`GridConfig::validate`] before anything is built from it.

use serde::{Deserialize, Serialize};

use crate::GridNavError;
use crate::grid::{Direction, MoveVector, Terrain};

/// Probabilities of the four stochastic outcomes of a commanded move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionProbabilities {
    pub forward: f64,
    pub backward: f64,
    pub left: f64,
    pub right: f64,
}

/// Rewards collected on each outcome of a move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rewards {
    /// Added for every step that lands on a non-wall cell.
    pub step: f64,
    /// Replaces the step reward when the robot bumps into a wall or the border.
    pub wall: f64,
    /// Added on top of `step` when the robot lands on the goal.
    pub goal: f64,
    /// Added on top of `step` when the robot lands in a pit.
    pub pit: f64,
}

/// Value-iteration settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub discount: f64,
    pub max_iterations: usize,
    /// Summed absolute value change below which a sweep counts as converged.
    pub threshold_difference: f64,
}

/// Mean temperature emitted by each terrain category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureMeans {
    pub hot: f64,
    pub neutral: f64,
    pub cold: f64,
}

impl TemperatureMeans {
    pub fn mean(&self, terrain: Terrain) -> f64 {
        match terrain {
            Terrain::Hot => self.hot,
            Terrain::Neutral => self.neutral,
            Terrain::Cold => self.cold,
        }
    }
}

impl Default for TemperatureMeans {
    fn default() -> Self {
        Self {
            hot: 40.0,
            neutral: 25.0,
            cold: 20.0,
        }
    }
}

/// Sensor noise, motion reliability and termination settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensingSettings {
    pub temp_noise_std_dev: f64,
    pub prob_tex_correct: f64,
    pub prob_move_correct: f64,
    /// Belief mass on the goal cell required to declare success.
    pub goal_confidence: f64,
    /// Post-move multiplier on the predicted cell; `None` disables the boost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_boost: Option<f64>,
    #[serde(default)]
    pub temperature_means: TemperatureMeans,
}

/// Complete input document for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// `[rows, cols]`.
    pub map_size: [usize; 2],
    /// True starting cell, only used by the simulated world.
    pub start: [usize; 2],
    pub goal: [usize; 2],
    #[serde(default)]
    pub walls: Vec<[usize; 2]>,
    #[serde(default)]
    pub pits: Vec<[usize; 2]>,
    /// Candidate moves as `[dr, dc]`; must be exactly the four cardinal
    /// unit vectors.  Their order is the solver's tie-break order.
    pub possible_moves: Vec<[i32; 2]>,
    /// One string per row, whitespace separated labels `H`, `-` or `C`.
    pub terrain_map: Vec<String>,
    /// One string per row, whitespace separated texture labels.
    pub texture_map: Vec<String>,
    pub probabilities: ActionProbabilities,
    pub rewards: Rewards,
    pub solver: SolverSettings,
    pub sensing: SensingSettings,
}

impl GridConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, GridNavError> {
        let cfg = Self::parse_toml(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without validating it, so callers can layer
    /// overrides on top before calling [`GridConfig::validate`].
    pub fn parse_toml(raw: &str) -> Result<Self, GridNavError> {
        toml::from_str(raw)
            .map_err(|e| GridNavError::Config(format!("failed to parse grid config: {e}")))
    }

    /// Check every structural and numeric constraint.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] describing the first violation found.
    pub fn validate(&self) -> Result<(), GridNavError> {
        let [rows, cols] = self.map_size;
        if rows == 0 || cols == 0 {
            return Err(config_err(format!("map_size must be positive, got {rows}x{cols}")));
        }
        if rows.checked_mul(cols).is_none() {
            return Err(config_err(format!("map_size {rows}x{cols} is too large")));
        }

        self.terrain_cells()?;
        self.texture_cells()?;

        let in_bounds = |name: &str, cell: [usize; 2]| {
            if cell[0] < rows && cell[1] < cols {
                Ok(())
            } else {
                Err(config_err(format!(
                    "{name} {cell:?} lies outside the {rows}x{cols} grid"
                )))
            }
        };
        in_bounds("goal", self.goal)?;
        in_bounds("start", self.start)?;
        for wall in &self.walls {
            in_bounds("wall", *wall)?;
        }
        for pit in &self.pits {
            in_bounds("pit", *pit)?;
            if self.walls.contains(pit) {
                return Err(config_err(format!("cell {pit:?} is both a wall and a pit")));
            }
        }
        if self.walls.contains(&self.goal) || self.pits.contains(&self.goal) {
            return Err(config_err(format!("goal {:?} is blocked", self.goal)));
        }
        if self.walls.contains(&self.start) || self.pits.contains(&self.start) {
            return Err(config_err(format!("start {:?} is blocked", self.start)));
        }

        self.moves()?;

        let p = &self.probabilities;
        for (name, value) in [
            ("probabilities.forward", p.forward),
            ("probabilities.backward", p.backward),
            ("probabilities.left", p.left),
            ("probabilities.right", p.right),
            ("sensing.prob_tex_correct", self.sensing.prob_tex_correct),
            ("sensing.prob_move_correct", self.sensing.prob_move_correct),
            ("sensing.goal_confidence", self.sensing.goal_confidence),
        ] {
            check_probability(name, value)?;
        }

        let r = &self.rewards;
        let means = &self.sensing.temperature_means;
        for (name, value) in [
            ("rewards.step", r.step),
            ("rewards.wall", r.wall),
            ("rewards.goal", r.goal),
            ("rewards.pit", r.pit),
            ("sensing.temperature_means.hot", means.hot),
            ("sensing.temperature_means.neutral", means.neutral),
            ("sensing.temperature_means.cold", means.cold),
        ] {
            if !value.is_finite() {
                return Err(config_err(format!("{name} must be finite, got {value}")));
            }
        }

        let s = &self.solver;
        if !(0.0..=1.0).contains(&s.discount) {
            return Err(config_err(format!(
                "solver.discount must lie in [0, 1], got {}",
                s.discount
            )));
        }
        if s.max_iterations == 0 {
            return Err(config_err("solver.max_iterations must be at least 1".to_string()));
        }
        if !s.threshold_difference.is_finite() || s.threshold_difference < 0.0 {
            return Err(config_err(format!(
                "solver.threshold_difference must be a non-negative number, got {}",
                s.threshold_difference
            )));
        }

        let std_dev = self.sensing.temp_noise_std_dev;
        if !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(config_err(format!(
                "sensing.temp_noise_std_dev must be positive, got {std_dev}"
            )));
        }
        if let Some(boost) = self.sensing.confidence_boost
            && (!boost.is_finite() || boost <= 1.0)
        {
            return Err(config_err(format!(
                "sensing.confidence_boost must be greater than 1, got {boost}"
            )));
        }

        Ok(())
    }

    /// The configured move set as directions, in configuration order.
    ///
    /// # Errors
    ///
    /// Fails unless the set is exactly the four cardinal unit vectors.
    pub fn moves(&self) -> Result<Vec<Direction>, GridNavError> {
        if self.possible_moves.len() != 4 {
            return Err(config_err(format!(
                "possible_moves must list exactly 4 cardinal moves, got {}",
                self.possible_moves.len()
            )));
        }
        let mut moves = Vec::with_capacity(4);
        for raw in &self.possible_moves {
            let dir = Direction::from_vector(MoveVector::from(*raw))
                .ok_or_else(|| config_err(format!("move {raw:?} is not a cardinal unit vector")))?;
            if moves.contains(&dir) {
                return Err(config_err(format!("move {raw:?} listed twice")));
            }
            moves.push(dir);
        }
        Ok(moves)
    }

    /// Terrain labels flattened row-major.
    pub fn terrain_cells(&self) -> Result<Vec<Terrain>, GridNavError> {
        self.split_rows("terrain_map", &self.terrain_map)?
            .into_iter()
            .map(|label| {
                Terrain::from_label(&label)
                    .ok_or_else(|| config_err(format!("unknown terrain label '{label}'")))
            })
            .collect()
    }

    /// Texture labels flattened row-major.
    pub fn texture_cells(&self) -> Result<Vec<String>, GridNavError> {
        self.split_rows("texture_map", &self.texture_map)
    }

    fn split_rows(&self, name: &str, rows: &[String]) -> Result<Vec<String>, GridNavError> {
        let [n_rows, n_cols] = self.map_size;
        if rows.len() != n_rows {
            return Err(config_err(format!(
                "{name} has {} rows, expected {n_rows}",
                rows.len()
            )));
        }
        let mut cells = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let before = cells.len();
            cells.extend(row.split_whitespace().map(str::to_string));
            let width = cells.len() - before;
            if width != n_cols {
                return Err(config_err(format!(
                    "{name} row {i} has {width} cells, expected {n_cols}"
                )));
            }
        }
        Ok(cells)
    }
}

impl Default for GridConfig {
    /// A 3×4 demonstration world with one wall and one pit.
    fn default() -> Self {
        Self {
            map_size: [3, 4],
            start: [2, 0],
            goal: [0, 3],
            walls: vec![[1, 1]],
            pits: vec![[1, 3]],
            possible_moves: vec![[0, 1], [1, 0], [0, -1], [-1, 0]],
            terrain_map: vec![
                "C - - H".to_string(),
                "- - H -".to_string(),
                "H - C -".to_string(),
            ],
            texture_map: vec![
                "R S R S".to_string(),
                "S R S R".to_string(),
                "R R S S".to_string(),
            ],
            probabilities: ActionProbabilities {
                forward: 0.8,
                backward: 0.0,
                left: 0.1,
                right: 0.1,
            },
            rewards: Rewards {
                step: -1.0,
                wall: -5.0,
                goal: 10.0,
                pit: -10.0,
            },
            solver: SolverSettings {
                discount: 0.9,
                max_iterations: 100,
                threshold_difference: 0.001,
            },
            sensing: SensingSettings {
                temp_noise_std_dev: 1.0,
                prob_tex_correct: 0.9,
                prob_move_correct: 0.75,
                goal_confidence: 0.6,
                confidence_boost: Some(1.3),
                temperature_means: TemperatureMeans::default(),
            },
        }
    }
}

fn config_err(msg: String) -> GridNavError {
    GridNavError::Config(msg)
}

fn check_probability(name: &str, value: f64) -> Result<(), GridNavError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(config_err(format!("{name} must lie in [0, 1], got {value}")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
