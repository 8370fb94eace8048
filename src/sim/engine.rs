use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{error, info};

use super::data::{DataTypeRegistry, FlightData};
use super::event::{EventKind, FlightEvent};
use super::handler::{handle_events, hold_on_pad};
use super::listener::{ListenerSet, SimulationListener};
use super::recovery::RecoveryStepper;
use super::rk4::Rk4Stepper;
use super::status::{SimulationStatus, StepperKind};
use super::stepper::{Models, SimulationContext, SimulationStepper, MIN_TIME_STEP};
use super::warning::{Warning, WarningSet};
use crate::config::SimOptions;
use crate::error::{SimError, SimResult};
use crate::vehicle::Rocket;

/// Relative altitude at which the rocket counts as off the pad, m.
const LIFTOFF_ALTITUDE: f64 = 0.02;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Event-driven flight simulation.
///
/// Alternates between draining due events and taking one integration step,
/// RK4 while flying and a 3-DOF descent once a recovery device is out.
/// Stage separations spawn extra branches that are flown after the main one.
pub struct SimulationEngine {
    options: SimOptions,
    models: Models,
    listeners: ListenerSet,
    registry: Arc<DataTypeRegistry>,
    partial: Option<FlightData>,
}

impl SimulationEngine {
    pub fn new(options: SimOptions) -> Self {
        let models = Models::standard(&options);
        Self {
            options,
            models,
            listeners: ListenerSet::new(),
            registry: Arc::new(DataTypeRegistry::new()),
            partial: None,
        }
    }

    pub fn with_models(mut self, models: Models) -> Self {
        self.models = models;
        self
    }

    pub fn with_registry(mut self, registry: Arc<DataTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn add_listener(&mut self, listener: impl SimulationListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// Whatever was recorded by the last run that failed.
    pub fn partial_data(&self) -> Option<&FlightData> {
        self.partial.as_ref()
    }

    /// Fly `rocket` from the pad until every branch has ended.
    pub fn simulate(&mut self, rocket: Arc<Rocket>) -> SimResult<FlightData> {
        self.partial = None;
        self.options.validate()?;
        if rocket.stages.is_empty() {
            return Err(SimError::InvalidConfig("rocket has no stages".into()));
        }
        if rocket.mounts.is_empty() {
            return Err(SimError::NoMotorsDefined);
        }

        info!(rocket = %rocket.name, "simulation started");
        let mut main = SimulationStatus::new(rocket, &self.options, Arc::clone(&self.registry));
        main.add_event(FlightEvent::new(EventKind::Launch, 0.0));

        let mut pending = VecDeque::from([main]);
        let mut branches = Vec::new();
        let mut warnings = WarningSet::new();

        while let Some(mut status) = pending.pop_front() {
            let mut spawned = Vec::new();
            let result = self.run_branch(&mut status, &mut spawned);
            self.listeners.end_simulation(&status, result.as_ref().err());
            pending.extend(spawned);

            let (branch, branch_warnings) = status.finish();
            info!(
                branch = branch.name(),
                points = branch.len(),
                warnings = branch_warnings.len(),
                "branch finished"
            );
            warnings.extend(branch_warnings);
            branches.push(branch);

            if let Err(e) = result {
                self.partial = Some(FlightData::new(branches, warnings));
                return Err(e);
            }
        }

        let data = FlightData::new(branches, warnings);
        info!(
            max_altitude = data.summary.max_altitude,
            flight_time = data.summary.flight_time,
            warnings = data.warnings.len(),
            "simulation finished"
        );
        Ok(data)
    }

    fn run_branch(&mut self, status: &mut SimulationStatus, spawned: &mut Vec<SimulationStatus>) -> SimResult<()> {
        let mut ctx = SimulationContext {
            options: &self.options,
            models: &mut self.models,
            listeners: &mut self.listeners,
        };
        let mut flight = Rk4Stepper::new(ctx.options.random_seed);
        let mut recovery = RecoveryStepper;
        let mut current = status.stepper_kind();
        match current {
            StepperKind::Flight => flight.initialize(status),
            StepperKind::Recovery => recovery.initialize(status),
        }

        ctx.listeners.start_simulation(status);

        loop {
            if handle_events(status, ctx.options, ctx.listeners, spawned)? {
                break;
            }

            if ctx.listeners.pre_step(status) {
                continue;
            }

            let max_step = status
                .queue
                .peek()
                .map_or(f64::INFINITY, |e| (e.time - status.time).max(MIN_TIME_STEP));

            let kind = status.stepper_kind();
            if kind != current {
                match kind {
                    StepperKind::Flight => flight.initialize(status),
                    StepperKind::Recovery => recovery.initialize(status),
                }
                current = kind;
            }

            let old_altitude = status.relative_position().z;
            match kind {
                StepperKind::Flight => flight.step(status, &mut ctx, max_step)?,
                StepperKind::Recovery => recovery.step(status, &mut ctx, max_step)?,
            }

            ctx.listeners.post_step(status);

            if status.has_nan() {
                let snapshot = status.snapshot();
                error!(%snapshot, "simulation produced NaN");
                return Err(SimError::NotANumber(Box::new(snapshot)));
            }
            if status.state.out_of_range() {
                return Err(SimError::ValuesOutOfRange(Box::new(status.snapshot())));
            }

            let now = status.time;
            let altitude = status.relative_position().z;
            status.add_event(FlightEvent::altitude(now, old_altitude, altitude));

            if !status.liftoff {
                if altitude < 0.0 {
                    hold_on_pad(status);
                }
                if altitude > LIFTOFF_ALTITUDE {
                    status.add_event(FlightEvent::new(EventKind::Liftoff, now));
                }
            } else if altitude < 0.0 {
                status.state.position.z = status.launch_origin.z;
                status.add_event(FlightEvent::new(EventKind::GroundHit, now));
                status.add_event(FlightEvent::new(EventKind::SimulationEnd, now));
            }

            if status.liftoff
                && !status.launch_rod_cleared
                && status.relative_position().norm() > status.effective_launch_rod_length
            {
                status.add_event(FlightEvent::new(EventKind::LaunchRodCleared, now));
            }

            let past_peak = status.apogee.update(now, status.relative_position().z);
            if !status.apogee_reached && past_peak {
                // stamped at the recorded peak, not at detection
                status.add_event(FlightEvent::new(EventKind::Apogee, status.apogee.max_time()));
            }

            if now > ctx.options.max_time {
                status.warnings.add(Warning::TimeLimitReached);
                status.add_event(FlightEvent::new(EventKind::SimulationEnd, now));
            }
        }
        Ok(())
    }
}

/// Fly `rocket` with the standard models and no listeners.
pub fn simulate(rocket: Rocket, options: &SimOptions) -> SimResult<FlightData> {
    SimulationEngine::new(options.clone()).simulate(Arc::new(rocket))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
