//! Discrete Bayes filter over grid cells.
//!
//! [`BeliefFilter`] owns the robot's probability distribution over its true
//! cell and exposes three update operators:
//!
//! - [`update_with_temperature`][BeliefFilter::update_with_temperature] –
//!   Gaussian likelihood of the reading under each cell's terrain mean;
//! - [`update_with_texture`][BeliefFilter::update_with_texture] –
//!   `p_correct` for matching cells, `1 − p_correct` otherwise;
//! - [`update_with_motion`][BeliefFilter::update_with_motion] – prediction
//!   step of a move that succeeds with `p_success` and otherwise leaves the
//!   robot in place.
//!
//! Every operator normalises and commits its result before returning, so the
//! stored distribution always sums to one.  Wall and pit cells start with zero
//! mass and keep it: the measurement updates multiply it, and the motion
//! update never moves mass onto them.  Mass the motion update pushes off the
//! grid is dropped, and normalisation spreads the loss over the rest.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gridnav_perception::belief::BeliefFilter;
//! use gridnav_perception::sensor_model::SensorModels;
//! use gridnav_types::{GridConfig, GridModel};
//!
//! let config = GridConfig::default();
//! let grid = Arc::new(GridModel::from_config(&config).unwrap());
//! let mut filter = BeliefFilter::new(grid, SensorModels::from_settings(&config.sensing)).unwrap();
//!
//! filter.update_with_temperature(40.0).unwrap();
//! filter.update_with_texture("R").unwrap();
//!
//! let total: f64 = filter.probabilities().iter().sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! ```

use std::sync::Arc;

use gridnav_types::{Cell, GridModel, GridNavError, MoveVector};
use tracing::trace;

use crate::sensor_model::SensorModels;

// ────────────────────────────────────────────────────────────────────────────
// BeliefFilter
// ────────────────────────────────────────────────────────────────────────────

/// Probability distribution over the cells of one grid.
#[derive(Debug, Clone)]
pub struct BeliefFilter {
    grid: Arc<GridModel>,
    models: SensorModels,
    /// Row-major, same indexing as [`GridModel::index`].
    belief: Vec<f64>,
}

impl BeliefFilter {
    /// Create a filter with a uniform prior over every non-blocked cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::DegenerateBelief`] if the grid has no cell the
    /// robot could occupy.
    pub fn new(grid: Arc<GridModel>, models: SensorModels) -> Result<Self, GridNavError> {
        let open = (0..grid.len()).filter(|&i| !grid.kind_at(i).is_blocked()).count();
        if open == 0 {
            return Err(GridNavError::DegenerateBelief {
                operation: "initialisation".to_string(),
            });
        }
        let uniform = 1.0 / open as f64;
        let belief = (0..grid.len())
            .map(|i| if grid.kind_at(i).is_blocked() { 0.0 } else { uniform })
            .collect();
        Ok(Self {
            grid,
            models,
            belief,
        })
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn models(&self) -> &SensorModels {
        &self.models
    }

    /// The full distribution, row-major.
    pub fn probabilities(&self) -> &[f64] {
        &self.belief
    }

    /// Mass at `cell`, or `None` outside the grid.
    pub fn probability(&self, cell: Cell) -> Option<f64> {
        self.grid.index(cell).map(|i| self.belief[i])
    }

    // -------------------------------------------------------------------------
    // Measurement updates
    // -------------------------------------------------------------------------

    /// Fuse a temperature reading.
    pub fn update_with_temperature(&mut self, reading: f64) -> Result<(), GridNavError> {
        let model = self.models.temperature;
        let posterior = self
            .belief
            .iter()
            .enumerate()
            .map(|(i, prior)| model.likelihood(reading, self.grid.terrain_at(i)) * prior)
            .collect();
        self.commit(posterior, "temperature update")
    }

    /// Fuse a texture reading.
    pub fn update_with_texture(&mut self, reading: &str) -> Result<(), GridNavError> {
        let model = self.models.texture;
        let posterior = self
            .belief
            .iter()
            .enumerate()
            .map(|(i, prior)| model.likelihood(reading, self.grid.texture_at(i)) * prior)
            .collect();
        self.commit(posterior, "texture update")
    }

    // -------------------------------------------------------------------------
    // Motion update
    // -------------------------------------------------------------------------

    /// Predict the effect of commanding `mv`.
    ///
    /// Each cell keeps `1 − p_success` of its mass and sends `p_success` to
    /// the cell `mv` away.  Mass aimed off the grid is dropped before
    /// normalisation; mass aimed at a blocked cell stays where it is, so
    /// walls and pits never gain mass.
    pub fn update_with_motion(&mut self, mv: MoveVector) -> Result<(), GridNavError> {
        let predicted = self.predict_motion(mv);
        self.commit(predicted, "motion update")
    }

    fn predict_motion(&self, mv: MoveVector) -> Vec<f64> {
        let p = self.models.motion.p_success;
        let mut predicted = vec![0.0; self.belief.len()];
        for (i, &mass) in self.belief.iter().enumerate() {
            if mass == 0.0 {
                continue;
            }
            let moved = mass * p;
            predicted[i] += mass - moved;

            let Some(dest) = self
                .grid
                .step(self.grid.cell_at(i), mv)
                .and_then(|c| self.grid.index(c))
            else {
                continue;
            };
            if self.grid.kind_at(dest).is_blocked() {
                predicted[i] += moved;
            } else {
                predicted[dest] += moved;
            }
        }
        predicted
    }

    // -------------------------------------------------------------------------
    // Queries / post-processing
    // -------------------------------------------------------------------------

    /// Maximum-a-posteriori cell and its probability.
    ///
    /// Scans row-major and keeps the first cell on ties.  When no cell holds
    /// positive mass the result is `((0, 0), 0.0)`.
    pub fn map_estimate(&self) -> (Cell, f64) {
        let mut best = (Cell::new(0, 0), 0.0);
        for (i, &mass) in self.belief.iter().enumerate() {
            if mass > best.1 {
                best = (self.grid.cell_at(i), mass);
            }
        }
        best
    }

    /// Multiply the mass at `cell` by `factor` and renormalise.
    ///
    /// Returns `Ok(false)` without touching the distribution when `cell` is
    /// outside the grid or blocked.
    pub fn reweight_cell(&mut self, cell: Cell, factor: f64) -> Result<bool, GridNavError> {
        let Some(idx) = self.grid.index(cell) else {
            return Ok(false);
        };
        if self.grid.kind_at(idx).is_blocked() {
            return Ok(false);
        }
        let mut weighted = self.belief.clone();
        weighted[idx] *= factor;
        self.commit(weighted, "confidence reweighting")?;
        Ok(true)
    }

    /// Normalise `mass` and make it the current belief.
    ///
    /// The stored belief is left untouched when the total is zero or not
    /// finite.
    fn commit(&mut self, mut mass: Vec<f64>, operation: &str) -> Result<(), GridNavError> {
        let total: f64 = mass.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(GridNavError::DegenerateBelief {
                operation: operation.to_string(),
            });
        }
        for m in &mut mass {
            *m /= total;
        }
        self.belief = mass;
        trace!(operation, estimate = ?self.map_estimate(), "belief committed");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_model::{MotionModel, TemperatureModel, TextureModel};
    use gridnav_types::{CellKind, Direction, TemperatureMeans, Terrain};

    fn models(std_dev: f64, p_tex: f64, p_move: f64) -> SensorModels {
        SensorModels {
            temperature: TemperatureModel {
                means: TemperatureMeans::default(),
                std_dev,
            },
            texture: TextureModel { p_correct: p_tex },
            motion: MotionModel { p_success: p_move },
        }
    }

    /// 3×3 grid, wall in the centre, one hot cell at (0, 2).
    fn walled_grid() -> Arc<GridModel> {
        let mut terrain = vec![Terrain::Neutral; 9];
        terrain[2] = Terrain::Hot;
        terrain[6] = Terrain::Cold;
        let texture = ["R", "S", "R", "S", "R", "S", "R", "S", "R"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Arc::new(
            GridModel::new(3, 3, &[Cell::new(1, 1)], &[Cell::new(2, 0)], Cell::new(2, 2), terrain, texture)
                .unwrap(),
        )
    }

    fn line_grid(len: usize) -> Arc<GridModel> {
        Arc::new(
            GridModel::new(
                1,
                len,
                &[],
                &[],
                Cell::new(0, len - 1),
                vec![Terrain::Neutral; len],
                vec!["S".to_string(); len],
            )
            .unwrap(),
        )
    }

    fn total(filter: &BeliefFilter) -> f64 {
        filter.probabilities().iter().sum()
    }

    #[test]
    fn initial_belief_is_uniform_over_open_cells() {
        let filter = BeliefFilter::new(walled_grid(), models(1.0, 0.9, 0.8)).unwrap();
        assert_eq!(filter.probability(Cell::new(1, 1)), Some(0.0));
        assert_eq!(filter.probability(Cell::new(2, 0)), Some(0.0));
        let open = filter.probability(Cell::new(0, 0)).unwrap();
        assert!((open - 1.0 / 7.0).abs() < 1e-12);
        assert!((total(&filter) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn three_hot_readings_concentrate_on_hot_cell() {
        let mut filter = BeliefFilter::new(walled_grid(), models(1.0, 0.9, 0.8)).unwrap();
        for _ in 0..3 {
            filter.update_with_temperature(40.0).unwrap();
        }
        let (cell, p) = filter.map_estimate();
        assert_eq!(cell, Cell::new(0, 2));
        assert!(p >= 0.99, "hot cell only holds {p}");
    }

    #[test]
    fn updates_keep_distribution_normalised_and_walls_empty() {
        let grid = walled_grid();
        let mut filter = BeliefFilter::new(Arc::clone(&grid), models(2.0, 0.8, 0.7)).unwrap();
        let moves = [Direction::E, Direction::S, Direction::W, Direction::N];
        for (step, dir) in moves.iter().cycle().take(12).enumerate() {
            filter.update_with_temperature(20.0 + step as f64).unwrap();
            filter.update_with_texture(if step % 2 == 0 { "R" } else { "S" }).unwrap();
            filter.update_with_motion(dir.vector()).unwrap();

            assert!((total(&filter) - 1.0).abs() < 1e-9);
            for cell in grid.cells().filter(|c| grid.kind(*c).is_blocked()) {
                assert_eq!(filter.probability(cell), Some(0.0), "blocked {cell} gained mass");
            }
        }
    }

    #[test]
    fn motion_update_keeps_unit_mass() {
        let mut filter = BeliefFilter::new(walled_grid(), models(1.0, 0.9, 0.65)).unwrap();
        filter.update_with_temperature(24.0).unwrap();
        for dir in Direction::ALL {
            filter.update_with_motion(dir.vector()).unwrap();
            assert!((total(&filter) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn motion_prediction_only_loses_mass_leaving_the_grid() {
        let mut filter = BeliefFilter::new(line_grid(3), models(1.0, 0.9, 0.5)).unwrap();
        filter.belief = vec![0.2, 0.3, 0.5];

        let east: f64 = filter.predict_motion(Direction::E.vector()).iter().sum();
        assert!((east - (1.0 - 0.5 * 0.5)).abs() < 1e-12);

        let west: f64 = filter.predict_motion(Direction::W.vector()).iter().sum();
        assert!((west - (1.0 - 0.2 * 0.5)).abs() < 1e-12);

        // Vertical moves on a single row send every moved share off the grid.
        let north: f64 = filter.predict_motion(Direction::N.vector()).iter().sum();
        assert!((north - 0.5).abs() < 1e-12);
    }

    #[test]
    fn motion_shifts_mass_and_drops_it_at_border() {
        let mut filter = BeliefFilter::new(line_grid(3), models(1.0, 0.9, 0.75)).unwrap();
        filter.belief = vec![1.0, 0.0, 0.0];

        filter.update_with_motion(Direction::E.vector()).unwrap();
        let b = filter.probabilities();
        assert!((b[0] - 0.25).abs() < 1e-12);
        assert!((b[1] - 0.75).abs() < 1e-12);
        assert_eq!(b[2], 0.0);

        filter.belief = vec![0.5, 0.0, 0.5];
        filter.update_with_motion(Direction::E.vector()).unwrap();
        let b = filter.probabilities();
        assert!((b[0] - 0.2).abs() < 1e-12);
        assert!((b[1] - 0.6).abs() < 1e-12);
        assert!((b[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn certain_move_off_the_grid_is_degenerate() {
        let mut filter = BeliefFilter::new(line_grid(3), models(1.0, 0.9, 1.0)).unwrap();
        filter.belief = vec![0.0, 0.0, 1.0];
        let err = filter.update_with_motion(Direction::E.vector()).unwrap_err();
        assert!(matches!(err, GridNavError::DegenerateBelief { .. }));
        assert_eq!(filter.probabilities(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn motion_does_not_enter_walls() {
        let grid = walled_grid();
        let mut filter = BeliefFilter::new(Arc::clone(&grid), models(1.0, 0.9, 1.0)).unwrap();
        filter.belief = vec![0.0; 9];
        filter.belief[1] = 1.0; // (0, 1), directly above the wall
        filter.update_with_motion(Direction::S.vector()).unwrap();
        assert_eq!(grid.kind(Cell::new(1, 1)), CellKind::Wall);
        assert_eq!(filter.probability(Cell::new(1, 1)), Some(0.0));
        assert_eq!(filter.probability(Cell::new(0, 1)), Some(1.0));
    }

    #[test]
    fn texture_update_weights_matching_cells() {
        let grid = GridModel::new(
            1,
            2,
            &[],
            &[],
            Cell::new(0, 1),
            vec![Terrain::Neutral; 2],
            vec!["R".to_string(), "S".to_string()],
        )
        .unwrap();
        let mut filter = BeliefFilter::new(Arc::new(grid), models(1.0, 0.8, 0.8)).unwrap();
        filter.update_with_texture("R").unwrap();
        assert!((filter.probabilities()[0] - 0.8).abs() < 1e-12);
        assert!((filter.probabilities()[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn degenerate_update_is_reported_and_belief_kept() {
        let mut filter = BeliefFilter::new(line_grid(3), models(1.0, 1.0, 0.8)).unwrap();
        let before = filter.probabilities().to_vec();
        let err = filter.update_with_texture("R").unwrap_err();
        assert!(matches!(err, GridNavError::DegenerateBelief { ref operation } if operation == "texture update"));
        assert_eq!(filter.probabilities(), before.as_slice());

        assert!(filter.update_with_temperature(f64::NAN).is_err());
        assert_eq!(filter.probabilities(), before.as_slice());
    }

    #[test]
    fn map_estimate_keeps_first_on_ties() {
        let mut filter = BeliefFilter::new(line_grid(3), models(1.0, 0.9, 0.8)).unwrap();
        assert_eq!(filter.map_estimate().0, Cell::new(0, 0));

        filter.belief = vec![0.2, 0.4, 0.4];
        assert_eq!(filter.map_estimate(), (Cell::new(0, 1), 0.4));

        filter.belief = vec![0.0; 3];
        assert_eq!(filter.map_estimate(), (Cell::new(0, 0), 0.0));
    }

    #[test]
    fn reweight_cell_boosts_and_renormalises() {
        let mut filter = BeliefFilter::new(walled_grid(), models(1.0, 0.9, 0.8)).unwrap();
        let before = filter.probability(Cell::new(0, 0)).unwrap();
        assert!(filter.reweight_cell(Cell::new(0, 0), 1.3).unwrap());
        assert!(filter.probability(Cell::new(0, 0)).unwrap() > before);
        assert!((total(&filter) - 1.0).abs() < 1e-12);

        assert!(!filter.reweight_cell(Cell::new(1, 1), 1.3).unwrap());
        assert!(!filter.reweight_cell(Cell::new(7, 7), 1.3).unwrap());
    }
}
