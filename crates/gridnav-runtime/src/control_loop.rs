//! [`ControlLoop`] – the sense → localise → act cycle.
//!
//! Every temperature reading drives exactly one cycle:
//!
//! 1. **Localise** – fuse the reading, ask the texture sensor for one label
//!    and fuse that too.
//! 2. **Select** – take the MAP estimate.  If it is the goal and its mass
//!    reaches the configured confidence the loop terminates: final telemetry
//!    is published, the completion signal fires and later readings are
//!    ignored.
//! 3. **Act** – look up the policy at the estimate.  A non-move label stalls
//!    the cycle (published as [`EventPayload::CycleStalled`]).  Otherwise the
//!    move is requested, the motion model is applied, the optional
//!    [`ConfidenceBoost`] runs and telemetry is published.
//!
//! Device failures and a degenerate belief are returned to the caller; a stall
//! is not an error.  Nothing is published for a cycle that failed.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gridnav_hal::sim::{SimDevices, SimWorld};
//! use gridnav_middleware::EventBus;
//! use gridnav_runtime::ControlLoop;
//! use gridnav_types::{Cell, GridConfig, GridModel};
//!
//! let config = GridConfig::default();
//! let grid = Arc::new(GridModel::from_config(&config).unwrap());
//! let world = SimWorld::new(grid, Cell::from(config.start), &config.sensing, 11).unwrap();
//! let SimDevices { mut temperature, texture, mover, .. } = SimDevices::new(world);
//!
//! let mut control = ControlLoop::from_config(
//!     &config,
//!     Box::new(texture),
//!     Box::new(mover),
//!     EventBus::default(),
//! )
//! .unwrap();
//! let summary = control.run(&mut temperature, 200).unwrap();
//! assert!(summary.completion.is_some());
//! ```

use std::sync::Arc;

use gridnav_hal::device::{MoveExecutor, TemperatureSensor, TextureSensor};
use gridnav_middleware::{EventBus, Topic};
use gridnav_perception::{BeliefFilter, SensorModels};
use gridnav_planning::{PolicyMap, ValueIteration};
use gridnav_types::{
    Cell, Completion, Direction, Event, EventPayload, GridConfig, GridModel, GridNavError,
    PolicyLabel, TelemetrySnapshot,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::boost::ConfidenceBoost;

/// Source tag stamped on every event this loop publishes.
const SOURCE: &str = "gridnav-runtime::control_loop";

// ─────────────────────────────────────────────────────────────────────────────
// States and outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Where the loop is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingSensors,
    Localizing,
    SelectingAction,
    Moving,
    /// Goal reached with enough confidence.  Terminal.
    Terminated,
}

/// What one call to [`ControlLoop::handle_temperature`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Moved {
        estimate: Cell,
        direction: Direction,
        probability: f64,
    },
    /// The policy at the estimate was not a move.
    Stalled { estimate: Cell, label: PolicyLabel },
    Completed(Completion),
    /// The reading arrived after termination and was dropped.
    Ignored,
}

/// Tallies of a [`ControlLoop::run`] or [`ControlLoop::run_channel`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Readings that produced a cycle (ignored readings are not counted).
    pub cycles: u64,
    pub moves: u64,
    pub stalls: u64,
    pub completion: Option<Completion>,
}

impl RunSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Ignored => return,
            CycleOutcome::Moved { .. } => self.moves += 1,
            CycleOutcome::Stalled { .. } => self.stalls += 1,
            CycleOutcome::Completed(completion) => self.completion = Some(*completion),
        }
        self.cycles += 1;
    }
}

/// Decision parameters that are not part of the sensor models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    /// Minimum MAP mass on the goal cell before the loop terminates.
    pub goal_confidence: f64,
    /// `None` disables the post-motion boost.
    pub boost: Option<ConfidenceBoost>,
}

impl LoopSettings {
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] for an unusable boost factor.
    pub fn from_config(config: &GridConfig) -> Result<Self, GridNavError> {
        Ok(Self {
            goal_confidence: config.sensing.goal_confidence,
            boost: config
                .sensing
                .confidence_boost
                .map(ConfidenceBoost::new)
                .transpose()?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the belief, the policy and the device handles for one run.
pub struct ControlLoop {
    grid: Arc<GridModel>,
    policy: PolicyMap,
    filter: BeliefFilter,
    texture: Box<dyn TextureSensor>,
    mover: Box<dyn MoveExecutor>,
    bus: EventBus,
    settings: LoopSettings,
    state: LoopState,
    position: Option<Cell>,
    cycles: u64,
    // ── Completion signal ─────────────────────────────────────────────────────
    completion_tx: Option<oneshot::Sender<Completion>>,
    completion_rx: Option<oneshot::Receiver<Completion>>,
}

impl ControlLoop {
    /// Assemble a loop from an already solved policy.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] when the policy does not cover the
    /// grid, and [`GridNavError::DegenerateBelief`] when the grid has no open
    /// cell to start from.
    pub fn new(
        grid: Arc<GridModel>,
        policy: PolicyMap,
        models: SensorModels,
        settings: LoopSettings,
        texture: Box<dyn TextureSensor>,
        mover: Box<dyn MoveExecutor>,
        bus: EventBus,
    ) -> Result<Self, GridNavError> {
        if policy.rows() != grid.rows() || policy.cols() != grid.cols() {
            return Err(GridNavError::Config(format!(
                "policy is {}x{} but the grid is {}x{}",
                policy.rows(),
                policy.cols(),
                grid.rows(),
                grid.cols()
            )));
        }
        let filter = BeliefFilter::new(Arc::clone(&grid), models)?;
        let (completion_tx, completion_rx) = oneshot::channel();
        Ok(Self {
            grid,
            policy,
            filter,
            texture,
            mover,
            bus,
            settings,
            state: LoopState::AwaitingSensors,
            position: None,
            cycles: 0,
            completion_tx: Some(completion_tx),
            completion_rx: Some(completion_rx),
        })
    }

    /// Build the grid, solve the policy, publish it on [`Topic::Planning`]
    /// and assemble the loop.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] for an invalid configuration.
    pub fn from_config(
        config: &GridConfig,
        texture: Box<dyn TextureSensor>,
        mover: Box<dyn MoveExecutor>,
        bus: EventBus,
    ) -> Result<Self, GridNavError> {
        let grid = Arc::new(GridModel::from_config(config)?);
        let solution = ValueIteration::from_config(&grid, config)?.solve_with_values();
        info!(
            sweeps = solution.sweeps,
            converged = solution.converged,
            "policy ready"
        );

        let control = Self::new(
            Arc::clone(&grid),
            solution.policy,
            SensorModels::from_settings(&config.sensing),
            LoopSettings::from_config(config)?,
            texture,
            mover,
            bus,
        )?;
        control.publish(
            Topic::Planning,
            EventPayload::PolicyComputed {
                rows: grid.rows(),
                cols: grid.cols(),
                policy: control.policy.labels().to_vec(),
                sweeps: solution.sweeps,
                converged: solution.converged,
            },
        );
        Ok(control)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn policy(&self) -> &PolicyMap {
        &self.policy
    }

    pub fn belief(&self) -> &BeliefFilter {
        &self.filter
    }

    /// Estimate recorded by the last completed cycle.
    pub fn position(&self) -> Option<Cell> {
        self.position
    }

    /// Cycles processed so far (ignored readings excluded).
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Clone of the bus, for late subscribers.
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    /// Take the receiving half of the completion signal.  Only the first call
    /// returns `Some`.
    pub fn completion(&mut self) -> Option<oneshot::Receiver<Completion>> {
        self.completion_rx.take()
    }

    // -------------------------------------------------------------------------
    // Cycle
    // -------------------------------------------------------------------------

    /// Run one decision cycle for a temperature reading.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::ExternalRequest`] when the texture or move
    /// request fails and [`GridNavError::DegenerateBelief`] when an update
    /// wipes out all belief mass.  The state returns to
    /// [`LoopState::AwaitingSensors`], but the loop should not be driven
    /// further after an error.
    #[instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub fn handle_temperature(&mut self, reading: f64) -> Result<CycleOutcome, GridNavError> {
        if self.state == LoopState::Terminated {
            trace!("reading after termination ignored");
            return Ok(CycleOutcome::Ignored);
        }
        self.cycles += 1;

        let result = self.run_cycle(reading);
        if let Err(e) = &result {
            warn!(error = %e, state = ?self.state, "cycle failed");
            self.state = LoopState::AwaitingSensors;
        }
        result
    }

    fn run_cycle(&mut self, reading: f64) -> Result<CycleOutcome, GridNavError> {
        // ── Localise ──────────────────────────────────────────────────────────
        self.state = LoopState::Localizing;
        self.filter.update_with_temperature(reading)?;
        let texture = self.texture.read_texture()?;
        self.filter.update_with_texture(&texture)?;

        // ── Select ────────────────────────────────────────────────────────────
        self.state = LoopState::SelectingAction;
        let (estimate, probability) = self.filter.map_estimate();
        debug!(%estimate, probability, %texture, "localised");

        if estimate == self.grid.goal() && probability >= self.settings.goal_confidence {
            return Ok(self.terminate(reading, texture, estimate, probability));
        }

        // The estimate always lies on the grid the policy was solved for.
        let label = self.policy.get(estimate).unwrap_or(PolicyLabel::Wall);
        let Some(direction) = label.direction() else {
            warn!(%estimate, %label, "no move available at estimate, cycle stalled");
            self.publish(
                Topic::Lifecycle,
                EventPayload::CycleStalled { estimate, label },
            );
            self.state = LoopState::AwaitingSensors;
            return Ok(CycleOutcome::Stalled { estimate, label });
        };

        // ── Act ───────────────────────────────────────────────────────────────
        self.state = LoopState::Moving;
        let mv = direction.vector();
        self.mover.execute(mv)?;
        self.filter.update_with_motion(mv)?;
        if let Some(boost) = self.settings.boost {
            boost.apply(&mut self.filter, estimate, mv)?;
        }

        self.position = Some(estimate);
        self.publish_telemetry(reading, texture);
        self.state = LoopState::AwaitingSensors;
        debug!(%estimate, %direction, "move executed");

        Ok(CycleOutcome::Moved {
            estimate,
            direction,
            probability,
        })
    }

    /// Pull readings from `sensor` until the goal is reached or `max_cycles`
    /// cycles have run.
    ///
    /// # Errors
    ///
    /// Stops at the first sensor failure or cycle error.
    pub fn run(
        &mut self,
        sensor: &mut dyn TemperatureSensor,
        max_cycles: u64,
    ) -> Result<RunSummary, GridNavError> {
        self.run_with(sensor, max_cycles, |_| {})
    }

    /// Like [`run`][Self::run], calling `on_cycle` after every cycle.
    ///
    /// # Errors
    ///
    /// Stops at the first sensor failure or cycle error.
    pub fn run_with<F>(
        &mut self,
        sensor: &mut dyn TemperatureSensor,
        max_cycles: u64,
        mut on_cycle: F,
    ) -> Result<RunSummary, GridNavError>
    where
        F: FnMut(&CycleOutcome),
    {
        let mut summary = RunSummary::default();
        while self.state != LoopState::Terminated && summary.cycles < max_cycles {
            let reading = sensor.read_temperature()?;
            let outcome = self.handle_temperature(reading)?;
            summary.record(&outcome);
            on_cycle(&outcome);
        }
        if summary.completion.is_none() {
            warn!(max_cycles, sensor = sensor.id(), "cycle budget exhausted before reaching the goal");
        }
        Ok(summary)
    }

    /// Consume readings from a channel until it closes or the loop
    /// terminates.
    ///
    /// # Errors
    ///
    /// Stops at the first cycle error.
    pub async fn run_channel(
        &mut self,
        mut readings: mpsc::Receiver<f64>,
    ) -> Result<RunSummary, GridNavError> {
        let mut summary = RunSummary::default();
        while let Some(reading) = readings.recv().await {
            let outcome = self.handle_temperature(reading)?;
            summary.record(&outcome);
            if self.state == LoopState::Terminated {
                break;
            }
        }
        Ok(summary)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn terminate(
        &mut self,
        reading: f64,
        texture: String,
        goal: Cell,
        probability: f64,
    ) -> CycleOutcome {
        self.state = LoopState::Terminated;
        self.position = Some(goal);
        self.publish_telemetry(reading, texture);

        let completion = Completion {
            goal,
            probability,
            cycles: self.cycles,
        };
        self.publish(Topic::Lifecycle, EventPayload::Completed(completion));
        if let Some(tx) = self.completion_tx.take() {
            // The receiver may already be gone.
            let _ = tx.send(completion);
        }
        info!(%goal, probability, cycles = self.cycles, "goal reached");
        CycleOutcome::Completed(completion)
    }

    fn publish_telemetry(&self, temperature: f64, texture: String) {
        let snapshot = TelemetrySnapshot {
            temperature,
            texture,
            belief: self.filter.probabilities().to_vec(),
            position: self.position,
        };
        self.publish(Topic::Telemetry, EventPayload::Telemetry(snapshot));
    }

    /// Best-effort publish: no subscribers is not an error.
    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Err(e) = self.bus.publish_to(topic, Event::new(SOURCE, payload)) {
            trace!(?topic, error = %e, "event not delivered");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
