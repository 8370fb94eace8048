use std::sync::Arc;
use std::time::Instant;

use nalgebra::{UnitQuaternion, Vector3};

use super::data::{BranchRecorder, DataTypeRegistry, FlightDataBranch};
use super::event::{ApogeeDetector, EventQueue, FlightEvent};
use super::state::RigidState;
use super::warning::WarningSet;
use crate::config::SimOptions;
use crate::error::StatusSnapshot;
use crate::vehicle::{Configuration, MotorState, RecoveryId, Rocket};

/// Which stepper advances the rocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperKind {
    /// Six-degree-of-freedom RK4 flight.
    Flight,
    /// Three-degree-of-freedom descent under canopy.
    Recovery,
}

/// Everything that changes during one simulation run. Owned by the engine.
#[derive(Debug)]
pub struct SimulationStatus {
    pub time: f64,
    pub previous_time_step: f64,
    pub state: RigidState,

    pub launch_origin: Vector3<f64>,
    pub launch_rod_direction: Vector3<f64>,
    pub effective_launch_rod_length: f64,

    pub configuration: Configuration,
    pub motors: MotorState,
    deployed: Vec<RecoveryId>,
    stepper: StepperKind,

    pub motor_ignited: bool,
    pub liftoff: bool,
    pub launch_rod_cleared: bool,
    pub apogee_reached: bool,

    pub apogee: ApogeeDetector,
    pub max_z_velocity: f64,
    /// Aerodynamic warnings are ignored before this time.
    pub start_warning_time: f64,

    pub warnings: WarningSet,
    pub recorder: BranchRecorder,
    pub queue: EventQueue,
    pub started: Instant,
}

impl SimulationStatus {
    pub fn new(rocket: Arc<Rocket>, options: &SimOptions, registry: Arc<DataTypeRegistry>) -> Self {
        let rod = options.launch_rod_vector();
        let orientation =
            UnitQuaternion::rotation_between(&Vector3::z(), &rod).unwrap_or_else(UnitQuaternion::identity);

        // the rocket leaves the guide when its rearmost lug does
        let lug_gap = rocket.launch_lug.map_or(0.0, |lug| (rocket.length() - lug).max(0.0));
        let effective_launch_rod_length = (options.launch_rod_length - lug_gap).max(0.0);

        let mut apogee = ApogeeDetector::default();
        apogee.update(0.0, 0.0);

        Self {
            time: 0.0,
            previous_time_step: 0.0,
            state: RigidState::at_rest(orientation),
            launch_origin: Vector3::zeros(),
            launch_rod_direction: rod,
            effective_launch_rod_length,
            recorder: BranchRecorder::new(rocket.name.clone(), registry),
            configuration: Configuration::new(rocket),
            motors: MotorState::default(),
            deployed: Vec::new(),
            stepper: StepperKind::Flight,
            motor_ignited: false,
            liftoff: false,
            launch_rod_cleared: false,
            apogee_reached: false,
            apogee,
            max_z_velocity: 0.0,
            start_warning_time: f64::INFINITY,
            warnings: WarningSet::new(),
            queue: EventQueue::new(),
            started: Instant::now(),
        }
    }

    /// Status for the stages dropped below `stage`, continuing from the
    /// current kinematics in a branch of its own.
    pub fn separated_branch(&self, stage: usize) -> Self {
        let configuration = self.configuration.lower_stages(stage);
        let name = configuration
            .active_stages()
            .next()
            .map_or_else(|| format!("Stage {}", stage + 1), |(_, s)| s.name.clone());
        Self {
            time: self.time,
            previous_time_step: self.previous_time_step,
            state: self.state,
            launch_origin: self.launch_origin,
            launch_rod_direction: self.launch_rod_direction,
            effective_launch_rod_length: self.effective_launch_rod_length,
            recorder: BranchRecorder::new(name, Arc::clone(self.recorder.registry())),
            configuration,
            motors: self.motors.clone(),
            deployed: Vec::new(),
            stepper: StepperKind::Flight,
            motor_ignited: true,
            liftoff: true,
            launch_rod_cleared: true,
            apogee_reached: self.apogee_reached,
            apogee: self.apogee,
            max_z_velocity: self.max_z_velocity,
            start_warning_time: self.start_warning_time,
            warnings: WarningSet::new(),
            queue: self.queue.clone(),
            started: Instant::now(),
        }
    }

    /// Close the run, returning the recorded branch and its warnings.
    pub fn finish(self) -> (FlightDataBranch, WarningSet) {
        (self.recorder.finish(), self.warnings)
    }

    pub fn add_event(&mut self, event: FlightEvent) {
        self.queue.push(event);
    }

    /// Deploy a recovery device and switch to the descent stepper.
    /// Returns false when it was already deployed.
    pub fn deploy(&mut self, id: RecoveryId) -> bool {
        if self.deployed.contains(&id) {
            return false;
        }
        self.deployed.push(id);
        self.stepper = StepperKind::Recovery;
        true
    }

    pub fn deployed(&self) -> &[RecoveryId] {
        &self.deployed
    }

    pub fn is_deployed(&self, id: RecoveryId) -> bool {
        self.deployed.contains(&id)
    }

    pub fn stepper_kind(&self) -> StepperKind {
        self.stepper
    }

    /// Position relative to where the rocket sat on the pad.
    pub fn relative_position(&self) -> Vector3<f64> {
        self.state.position - self.launch_origin
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            time: self.time,
            previous_time_step: self.previous_time_step,
            position: self.state.position,
            velocity: self.state.velocity,
            orientation: self.state.orientation,
            rotation: self.state.rotation,
            effective_launch_rod_length: self.effective_launch_rod_length,
        }
    }

    /// NaN in the kinematics or the step-control scalars.
    pub fn has_nan(&self) -> bool {
        self.state.has_nan() || self.time.is_nan() || self.previous_time_step.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::presets;

    fn status(options: &SimOptions) -> SimulationStatus {
        SimulationStatus::new(Arc::new(presets::single_stage()), options, Arc::new(DataTypeRegistry::new()))
    }

    #[test]
    fn launch_orientation_follows_rod() {
        let opts = SimOptions {
            launch_rod_angle: 5f64.to_radians(),
            launch_rod_direction: 90f64.to_radians(),
            ..Default::default()
        };
        let s = status(&opts);
        assert!((s.state.body_z() - opts.launch_rod_vector()).norm() < 1e-12);
    }

    #[test]
    fn lug_shortens_rod() {
        let s = status(&SimOptions::default());
        // 1.0 m rod, lug 0.2 m above the tail
        assert!((s.effective_launch_rod_length - 0.8).abs() < 1e-12);
    }

    #[test]
    fn deployment_switches_stepper() {
        let mut s = status(&SimOptions::default());
        assert_eq!(s.stepper_kind(), StepperKind::Flight);
        assert!(s.deployed().is_empty());
        assert!(s.deploy(RecoveryId(0)));
        assert!(!s.deploy(RecoveryId(0)));
        assert_eq!(s.stepper_kind(), StepperKind::Recovery);
        assert_eq!(s.deployed(), &[RecoveryId(0)]);
    }

    #[test]
    fn separated_branch_carries_kinematics() {
        let mut s = SimulationStatus::new(
            Arc::new(presets::two_stage()),
            &SimOptions::default(),
            Arc::new(DataTypeRegistry::new()),
        );
        s.time = 1.6;
        s.state.velocity.z = 80.0;
        s.configuration.set_to_stage(0);
        s.add_event(FlightEvent::new(crate::sim::EventKind::EjectionCharge, 1.6));

        let b = s.separated_branch(0);
        assert_eq!(b.time, 1.6);
        assert_eq!(b.state.velocity.z, 80.0);
        assert!(b.liftoff && b.launch_rod_cleared && b.motor_ignited);
        assert!(b.configuration.is_stage_active(1));
        assert!(!b.configuration.is_stage_active(0));
        assert_eq!(b.queue.len(), 1);
        assert_eq!(s.queue.len(), 1);
        let (branch, _) = b.finish();
        assert_eq!(branch.name(), "Booster");
    }
}
