//! Optional post-motion confidence boost.
//!
//! After a move has been commanded and the motion model applied, the cell the
//! robot was *meant* to reach (`estimate + move`) is multiplied by a factor
//! greater than one and the belief is renormalised.  The stage is disabled
//! entirely when no factor is configured.

use gridnav_perception::BeliefFilter;
use gridnav_types::{Cell, GridNavError, MoveVector};
use tracing::trace;

/// Multiplicative boost applied to the intended destination of a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBoost {
    factor: f64,
}

impl ConfidenceBoost {
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] unless `factor` is finite and > 1.
    pub fn new(factor: f64) -> Result<Self, GridNavError> {
        if !factor.is_finite() || factor <= 1.0 {
            return Err(GridNavError::Config(format!(
                "confidence boost must be a finite factor > 1, got {factor}"
            )));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Boost the cell reached from `estimate` by `mv`.
    ///
    /// Returns `Ok(false)` when that cell is off-grid or blocked and nothing
    /// was changed.
    ///
    /// # Errors
    ///
    /// Propagates [`GridNavError::DegenerateBelief`] from renormalisation.
    pub fn apply(
        &self,
        filter: &mut BeliefFilter,
        estimate: Cell,
        mv: MoveVector,
    ) -> Result<bool, GridNavError> {
        let Some(target) = estimate.offset(mv) else {
            return Ok(false);
        };
        let applied = filter.reweight_cell(target, self.factor)?;
        trace!(%target, applied, factor = self.factor, "confidence boost");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridnav_perception::SensorModels;
    use gridnav_types::{GridConfig, GridModel};

    use super::*;

    fn filter() -> BeliefFilter {
        let config = GridConfig::default();
        let grid = Arc::new(GridModel::from_config(&config).unwrap());
        BeliefFilter::new(grid, SensorModels::from_settings(&config.sensing)).unwrap()
    }

    #[test]
    fn rejects_factors_that_do_not_boost() {
        assert!(ConfidenceBoost::new(1.0).is_err());
        assert!(ConfidenceBoost::new(0.5).is_err());
        assert!(ConfidenceBoost::new(f64::INFINITY).is_err());
        assert!((ConfidenceBoost::new(2.0).unwrap().factor() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn boosts_intended_destination() {
        let mut belief = filter();
        let before = belief.probability(Cell::new(2, 1)).unwrap();

        let applied = ConfidenceBoost::new(1.3).unwrap()
            .apply(&mut belief, Cell::new(2, 0), MoveVector::new(0, 1))
            .unwrap();

        assert!(applied);
        assert!(belief.probability(Cell::new(2, 1)).unwrap() > before);
        let total: f64 = belief.probabilities().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn skips_off_grid_and_blocked_targets() {
        let mut belief = filter();
        let snapshot = belief.probabilities().to_vec();
        let boost = ConfidenceBoost::new(1.3).unwrap();

        // (0,0) moving north leaves the grid; (1,0) moving east hits the wall.
        assert!(!boost.apply(&mut belief, Cell::new(0, 0), MoveVector::new(-1, 0)).unwrap());
        assert!(!boost.apply(&mut belief, Cell::new(1, 0), MoveVector::new(0, 1)).unwrap());
        assert_eq!(belief.probabilities(), snapshot.as_slice());
    }
}
