//! Value-iteration MDP solver.
//!
//! Turns a [`GridModel`] plus an action/reward model into a [`PolicyMap`]
//! holding one [`Direction`] per free cell.
//!
//! # Transition model
//!
//! A commanded move in direction `d` ends in one of four outcomes: `d`
//! itself (probability `forward`), [`Direction::reverse`] (`backward`),
//! [`Direction::left_flank`] (`left`) and [`Direction::right_flank`]
//! (`right`).  An outcome that leaves the grid or hits a wall bounces back to
//! the current cell and earns `rewards.wall`; any other outcome earns
//! `rewards.step`, plus `rewards.goal` / `rewards.pit` when it lands on the
//! goal / a pit.  The probabilities are used as given, never renormalised.
//!
//! # Iteration
//!
//! ```text
//! V'(s) = max_d Σ_o p_o · (R(s, o) + γ · V(o))
//! ```
//!
//! Every sweep reads only the previous sweep's values (Jacobi update).  Ties
//! between moves keep the move listed first.  The solver stops after two
//! consecutive sweeps whose summed absolute change over free cells is below
//! `threshold_difference`, or after `max_iterations` sweeps.
//!
//! # Example
//!
//! ```rust
//! use gridnav_planning::value_iteration::ValueIteration;
//! use gridnav_types::{Cell, Direction, GridConfig, GridModel, PolicyLabel};
//!
//! let config = GridConfig::default();
//! let grid = GridModel::from_config(&config).unwrap();
//! let policy = ValueIteration::from_config(&grid, &config).unwrap().solve();
//!
//! assert_eq!(policy.get(Cell::new(0, 3)), Some(PolicyLabel::Goal));
//! assert!(policy.get(Cell::new(0, 2)).and_then(PolicyLabel::direction).is_some());
//! ```

use gridnav_types::{
    ActionProbabilities, Cell, CellKind, Direction, GridConfig, GridModel, GridNavError,
    PolicyLabel, Rewards, SolverSettings,
};
use tracing::{debug, info, instrument, warn};

/// Number of consecutive below-threshold sweeps that ends the iteration.
const CONVERGED_SWEEPS: usize = 2;

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

/// Per-cell action chosen by the solver, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMap {
    rows: usize,
    cols: usize,
    labels: Vec<PolicyLabel>,
}

impl PolicyMap {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Label at `cell`, or `None` outside the grid.
    pub fn get(&self, cell: Cell) -> Option<PolicyLabel> {
        (cell.row < self.rows && cell.col < self.cols)
            .then(|| self.labels[cell.row * self.cols + cell.col])
    }

    /// All labels, row-major.
    pub fn labels(&self) -> &[PolicyLabel] {
        &self.labels
    }

    /// Labels grouped by row.
    pub fn rows_iter(&self) -> impl Iterator<Item = &[PolicyLabel]> {
        self.labels.chunks(self.cols)
    }
}

/// Expected discounted return per cell, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMap {
    cols: usize,
    values: Vec<f64>,
}

impl ValueMap {
    pub fn get(&self, cell: Cell) -> Option<f64> {
        if cell.col >= self.cols {
            return None;
        }
        self.values.get(cell.row * self.cols + cell.col).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Full solver output.  [`ValueIteration::solve`] keeps only the policy.
#[derive(Debug, Clone)]
pub struct Solution {
    pub policy: PolicyMap,
    pub values: ValueMap,
    /// Sweeps actually performed.
    pub sweeps: usize,
    /// `true` when the stop was caused by the convergence test rather than
    /// the iteration cap.
    pub converged: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// ValueIteration
// ────────────────────────────────────────────────────────────────────────────

/// Value-iteration solver bound to one grid.
#[derive(Debug, Clone)]
pub struct ValueIteration<'a> {
    grid: &'a GridModel,
    moves: Vec<Direction>,
    probabilities: ActionProbabilities,
    rewards: Rewards,
    settings: SolverSettings,
}

impl<'a> ValueIteration<'a> {
    /// Create a solver.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] when `moves` is not a permutation of
    /// the four cardinal directions or `settings.max_iterations` is zero.
    pub fn new(
        grid: &'a GridModel,
        moves: &[Direction],
        probabilities: ActionProbabilities,
        rewards: Rewards,
        settings: SolverSettings,
    ) -> Result<Self, GridNavError> {
        let complete = moves.len() == Direction::ALL.len()
            && Direction::ALL.iter().all(|d| moves.contains(d));
        if !complete {
            return Err(GridNavError::Config(format!(
                "move set must contain exactly N, E, S and W, got {moves:?}"
            )));
        }
        if settings.max_iterations == 0 {
            return Err(GridNavError::Config(
                "solver.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            grid,
            moves: moves.to_vec(),
            probabilities,
            rewards,
            settings,
        })
    }

    /// Create a solver from the action, reward and solver sections of
    /// `config`.
    pub fn from_config(grid: &'a GridModel, config: &GridConfig) -> Result<Self, GridNavError> {
        Self::new(
            grid,
            &config.moves()?,
            config.probabilities,
            config.rewards,
            config.solver,
        )
    }

    /// Run value iteration and return the policy.
    pub fn solve(&self) -> PolicyMap {
        self.solve_with_values().policy
    }

    /// Run value iteration and return policy, values and sweep statistics.
    #[instrument(skip(self), fields(rows = self.grid.rows(), cols = self.grid.cols()))]
    pub fn solve_with_values(&self) -> Solution {
        let mut values = vec![0.0; self.grid.len()];
        let mut policy = self.initial_policy();
        let mut below_threshold = 0;
        let mut sweeps = 0;

        while sweeps < self.settings.max_iterations {
            let next = self.sweep(&values, &mut policy);
            let delta = self.total_change(&values, &next);
            values = next;
            sweeps += 1;

            if delta < self.settings.threshold_difference {
                below_threshold += 1;
            } else {
                below_threshold = 0;
            }
            debug!(sweep = sweeps, delta, "value iteration sweep");

            if below_threshold == CONVERGED_SWEEPS {
                break;
            }
        }

        let converged = below_threshold == CONVERGED_SWEEPS;
        if converged {
            info!(sweeps, "value iteration converged");
        } else {
            warn!(sweeps, "value iteration hit the iteration cap before converging");
        }

        Solution {
            policy: PolicyMap {
                rows: self.grid.rows(),
                cols: self.grid.cols(),
                labels: policy,
            },
            values: ValueMap {
                cols: self.grid.cols(),
                values,
            },
            sweeps,
            converged,
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Terminal tags for terminal cells; free cells get a placeholder that the
    /// first sweep overwrites.
    fn initial_policy(&self) -> Vec<PolicyLabel> {
        (0..self.grid.len())
            .map(|i| {
                PolicyLabel::terminal(self.grid.kind_at(i))
                    .unwrap_or(PolicyLabel::Move(self.moves[0]))
            })
            .collect()
    }

    /// One Jacobi sweep over every free cell.  Writes the winning move into
    /// `policy` and returns the new values.
    fn sweep(&self, prev: &[f64], policy: &mut [PolicyLabel]) -> Vec<f64> {
        let mut next = prev.to_vec();
        for idx in 0..self.grid.len() {
            if self.grid.kind_at(idx).is_terminal() {
                continue;
            }
            let cell = self.grid.cell_at(idx);
            let mut best: Option<(Direction, f64)> = None;
            for &dir in &self.moves {
                let q = self.expected_value(cell, idx, dir, prev);
                if best.is_none_or(|(_, v)| q > v) {
                    best = Some((dir, q));
                }
            }
            if let Some((dir, q)) = best {
                next[idx] = q;
                policy[idx] = PolicyLabel::Move(dir);
            }
        }
        next
    }

    /// Expected return of commanding `dir` from `cell`.
    fn expected_value(&self, cell: Cell, idx: usize, dir: Direction, prev: &[f64]) -> f64 {
        let p = &self.probabilities;
        [
            (p.forward, dir),
            (p.backward, dir.reverse()),
            (p.left, dir.left_flank()),
            (p.right, dir.right_flank()),
        ]
        .into_iter()
        .map(|(prob, outcome)| {
            let (reward, value) = self.outcome(cell, idx, outcome, prev);
            prob * (reward + self.settings.discount * value)
        })
        .sum()
    }

    /// Reward and successor value of ending up one step along `dir`.
    fn outcome(&self, cell: Cell, idx: usize, dir: Direction, prev: &[f64]) -> (f64, f64) {
        let target = self
            .grid
            .step(cell, dir.vector())
            .and_then(|c| self.grid.index(c))
            .filter(|&i| self.grid.kind_at(i) != CellKind::Wall);

        match target {
            Some(n) => {
                let bonus = match self.grid.kind_at(n) {
                    CellKind::Goal => self.rewards.goal,
                    CellKind::Pit => self.rewards.pit,
                    _ => 0.0,
                };
                (self.rewards.step + bonus, prev[n])
            }
            None => (self.rewards.wall, prev[idx]),
        }
    }

    /// Summed absolute change over free cells.
    fn total_change(&self, old: &[f64], new: &[f64]) -> f64 {
        old.iter()
            .zip(new)
            .enumerate()
            .filter(|(i, _)| !self.grid.kind_at(*i).is_terminal())
            .map(|(_, (a, b))| (a - b).abs())
            .sum()
    }
}

/// Solve `grid` in one call.
///
/// Equivalent to [`ValueIteration::new`] followed by
/// [`ValueIteration::solve`].
pub fn solve(
    grid: &GridModel,
    moves: &[Direction],
    probabilities: ActionProbabilities,
    rewards: Rewards,
    discount: f64,
    max_iterations: usize,
    threshold_difference: f64,
) -> Result<PolicyMap, GridNavError> {
    let settings = SolverSettings {
        discount,
        max_iterations,
        threshold_difference,
    };
    Ok(ValueIteration::new(grid, moves, probabilities, rewards, settings)?.solve())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
