use std::sync::Arc;

use super::motor::{MotorId, MotorMount};
use super::recovery::{RecoveryDevice, RecoveryId};
use super::stage::Stage;
use crate::sim::event::ComponentRef;

// ---------------------------------------------------------------------------
// Rocket: stages stacked nose to tail
// ---------------------------------------------------------------------------

/// Immutable rocket definition. Stage 0 is the top (nose) stage; the last
/// stage is the bottom booster.
#[derive(Debug, Clone)]
pub struct Rocket {
    pub name: String,
    pub stages: Vec<Stage>,
    pub mounts: Vec<MotorMount>,
    pub recovery: Vec<RecoveryDevice>,
    pub launch_lug: Option<f64>, // m from nose, aft end of the rearmost lug
}

impl Rocket {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Index of the bottom stage.
    pub fn bottom_stage(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    /// Distance from the nose to the forward end of `stage`.
    pub fn stage_offset(&self, stage: usize) -> f64 {
        self.stages.iter().take(stage).map(|s| s.length).sum()
    }

    pub fn length(&self) -> f64 {
        self.stages.iter().map(|s| s.length).sum()
    }

    pub fn mount(&self, id: MotorId) -> Option<&MotorMount> {
        self.mounts.iter().find(|m| m.id == id)
    }

    pub fn recovery_device(&self, id: RecoveryId) -> Option<&RecoveryDevice> {
        self.recovery.iter().find(|r| r.id == id)
    }

    /// Stage a referenced component belongs to.
    pub fn stage_of(&self, component: ComponentRef) -> Option<usize> {
        match component {
            ComponentRef::Motor(id) => self.mount(id).map(|m| m.stage),
            ComponentRef::Stage(n) => (n < self.stages.len()).then_some(n),
            ComponentRef::Recovery(id) => self.recovery_device(id).map(|r| r.stage),
        }
    }
}

// ---------------------------------------------------------------------------
// Rocket builder
// ---------------------------------------------------------------------------

pub struct RocketBuilder {
    rocket: Rocket,
}

impl RocketBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            rocket: Rocket {
                name: name.into(),
                stages: vec![],
                mounts: vec![],
                recovery: vec![],
                launch_lug: None,
            },
        }
    }

    /// Append a stage below the ones already added.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.rocket.stages.push(stage);
        self
    }

    pub fn motor(mut self, mut mount: MotorMount) -> Self {
        mount.id = MotorId(self.rocket.mounts.len());
        self.rocket.mounts.push(mount);
        self
    }

    pub fn recovery(mut self, mut device: RecoveryDevice) -> Self {
        device.id = RecoveryId(self.rocket.recovery.len());
        self.rocket.recovery.push(device);
        self
    }

    pub fn launch_lug(mut self, aft_position: f64) -> Self {
        self.rocket.launch_lug = Some(aft_position);
        self
    }

    pub fn build(self) -> Rocket {
        self.rocket
    }
}

// ---------------------------------------------------------------------------
// Configuration: which stages are still attached
// ---------------------------------------------------------------------------

/// Active-stage view of a rocket. The flying stack keeps `0..=n` after a
/// separation; the dropped stages continue as their own view.
#[derive(Debug, Clone)]
pub struct Configuration {
    rocket: Arc<Rocket>,
    active: Vec<bool>,
}

impl Configuration {
    pub fn new(rocket: Arc<Rocket>) -> Self {
        let active = vec![true; rocket.stage_count()];
        Self { rocket, active }
    }

    pub fn rocket(&self) -> &Rocket {
        &self.rocket
    }

    pub fn is_stage_active(&self, stage: usize) -> bool {
        self.active.get(stage).copied().unwrap_or(false)
    }

    /// Keep stages `0..=stage` and drop everything below.
    pub fn set_to_stage(&mut self, stage: usize) {
        for (i, a) in self.active.iter_mut().enumerate() {
            *a = i <= stage;
        }
    }

    /// View of the stages that separate below `stage`.
    pub fn lower_stages(&self, stage: usize) -> Configuration {
        let active = self.active.iter().enumerate().map(|(i, a)| *a && i > stage).collect();
        Configuration { rocket: Arc::clone(&self.rocket), active }
    }

    pub fn active_stages(&self) -> impl Iterator<Item = (usize, &Stage)> + '_ {
        self.rocket
            .stages
            .iter()
            .enumerate()
            .filter(move |(i, _)| self.is_stage_active(*i))
    }

    pub fn active_mounts(&self) -> impl Iterator<Item = &MotorMount> + '_ {
        self.rocket.mounts.iter().filter(move |m| self.is_stage_active(m.stage))
    }

    pub fn active_recovery(&self) -> impl Iterator<Item = &RecoveryDevice> + '_ {
        self.rocket.recovery.iter().filter(move |r| self.is_stage_active(r.stage))
    }

    /// Length of the attached stack, nose to tail.
    pub fn length(&self) -> f64 {
        self.active_stages().map(|(_, s)| s.length).sum()
    }

    /// Largest active body diameter.
    pub fn reference_length(&self) -> f64 {
        self.active_stages().map(|(_, s)| s.diameter).fold(0.0, f64::max)
    }

    pub fn reference_area(&self) -> f64 {
        let d = self.reference_length();
        std::f64::consts::PI * d * d / 4.0
    }
}

// ---------------------------------------------------------------------------
// Preset rockets
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;
    use crate::vehicle::motor::{EjectionDelay, IgnitionTrigger, ThrustCurveMotor};
    use crate::vehicle::recovery::DeployTrigger;
    use crate::vehicle::stage::StageBuilder;

    /// 29 mm F-class reload, ~40 Ns.
    pub fn f40_motor() -> ThrustCurveMotor {
        ThrustCurveMotor::new(
            "F40",
            vec![(0.0, 0.0), (0.05, 40.0), (0.2, 30.0), (1.4, 22.0), (1.6, 0.0)],
            0.09,
            0.05,
            0.1,
            0.029,
        )
    }

    /// Single-stage sport rocket ("Pathfinder") with a parachute at apogee.
    pub fn single_stage() -> Rocket {
        RocketBuilder::new("Pathfinder")
            .stage(
                StageBuilder::new("Sustainer")
                    .length(1.0)
                    .diameter(0.05)
                    .structure_mass(0.5)
                    .cg(0.55)
                    .cp(0.75)
                    .cd(0.45)
                    .cn_alpha(8.0)
                    .longitudinal_inertia(0.04)
                    .rotational_inertia(0.0002)
                    .build(),
            )
            .motor(
                MotorMount::new(0, 0.9, Arc::new(f40_motor()))
                    .ignition(IgnitionTrigger::Automatic, 0.0)
                    .ejection_delay(EjectionDelay::Seconds(5.0)),
            )
            .recovery(
                RecoveryDevice::parachute("Main", 0, 0.6, 0.8).deploy_on(DeployTrigger::Apogee, 0.0),
            )
            .launch_lug(0.8)
            .build()
    }

    /// Two-stage rocket: the booster's zero-delay ejection charge lights
    /// the sustainer.
    pub fn two_stage() -> Rocket {
        RocketBuilder::new("Pathfinder-2")
            .stage(
                StageBuilder::new("Sustainer")
                    .length(0.8)
                    .structure_mass(0.35)
                    .cg(0.4)
                    .cp(0.6)
                    .cd(0.4)
                    .cn_alpha(8.0)
                    .longitudinal_inertia(0.025)
                    .pitch_damping(5.0)
                    .build(),
            )
            .stage(
                StageBuilder::new("Booster")
                    .length(0.4)
                    .structure_mass(0.2)
                    .cg(0.2)
                    .cp(0.35)
                    .cd(0.15)
                    .cn_alpha(6.0)
                    .longitudinal_inertia(0.005)
                    .rotational_inertia(0.0001)
                    .pitch_damping(3.0)
                    .build(),
            )
            .motor(
                MotorMount::new(0, 0.7, Arc::new(f40_motor()))
                    .ignition(IgnitionTrigger::Automatic, 0.0)
                    .ejection_delay(EjectionDelay::Seconds(6.0)),
            )
            .motor(
                MotorMount::new(1, 0.3, Arc::new(f40_motor()))
                    .ignition(IgnitionTrigger::Automatic, 0.0)
                    .ejection_delay(EjectionDelay::Seconds(0.0)),
            )
            .recovery(
                RecoveryDevice::parachute("Main", 0, 0.6, 0.8).deploy_on(DeployTrigger::Apogee, 0.0),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::event::{EventKind, FlightEvent};
    use crate::vehicle::motor::IgnitionTrigger;
    use crate::vehicle::recovery::DeployTrigger;

    #[test]
    fn stage_offsets_accumulate() {
        let r = presets::two_stage();
        assert_eq!(r.stage_offset(0), 0.0);
        assert!((r.stage_offset(1) - 0.8).abs() < 1e-12);
        assert!((r.length() - 1.2).abs() < 1e-12);
        assert_eq!(r.bottom_stage(), 1);
    }

    #[test]
    fn builder_assigns_ids() {
        let r = presets::two_stage();
        assert_eq!(r.mounts[1].id, MotorId(1));
        assert_eq!(r.stage_of(ComponentRef::Motor(MotorId(1))), Some(1));
        assert_eq!(r.stage_of(ComponentRef::Stage(5)), None);
    }

    #[test]
    fn separation_drops_lower_stages() {
        let mut cfg = Configuration::new(Arc::new(presets::two_stage()));
        assert!((cfg.length() - 1.2).abs() < 1e-12);
        cfg.set_to_stage(0);
        assert!(cfg.is_stage_active(0));
        assert!(!cfg.is_stage_active(1));
        assert!((cfg.length() - 0.8).abs() < 1e-12);
        assert_eq!(cfg.active_mounts().count(), 1);
    }

    #[test]
    fn lower_stages_view_keeps_booster() {
        let cfg = Configuration::new(Arc::new(presets::two_stage()));
        let booster = cfg.lower_stages(0);
        assert!(!booster.is_stage_active(0));
        assert!(booster.is_stage_active(1));
        assert!((booster.length() - 0.4).abs() < 1e-12);
        assert_eq!(booster.active_recovery().count(), 0);
    }

    #[test]
    fn automatic_ignition_by_stage() {
        let r = presets::two_stage();
        let launch = FlightEvent::new(EventKind::Launch, 0.0);
        let booster_charge = FlightEvent::new(EventKind::EjectionCharge, 1.6)
            .with_source(ComponentRef::Motor(MotorId(1)));
        let sustainer_charge = FlightEvent::new(EventKind::EjectionCharge, 9.0)
            .with_source(ComponentRef::Motor(MotorId(0)));

        let auto = IgnitionTrigger::Automatic;
        assert!(auto.is_triggered_by(&launch, 1, &r));
        assert!(!auto.is_triggered_by(&launch, 0, &r));
        assert!(auto.is_triggered_by(&booster_charge, 0, &r));
        assert!(!auto.is_triggered_by(&sustainer_charge, 0, &r));
        assert!(!IgnitionTrigger::Never.is_triggered_by(&launch, 1, &r));
        assert!(IgnitionTrigger::Launch.is_triggered_by(&launch, 0, &r));
    }

    #[test]
    fn burnout_ignition_watches_stage_below() {
        let r = presets::two_stage();
        let burnout = FlightEvent::new(EventKind::Burnout, 1.6).with_source(ComponentRef::Motor(MotorId(1)));
        assert!(IgnitionTrigger::Burnout.is_triggered_by(&burnout, 0, &r));
        assert!(!IgnitionTrigger::Burnout.is_triggered_by(&burnout, 1, &r));
    }

    #[test]
    fn deploy_triggers() {
        let r = presets::two_stage();
        let apogee = FlightEvent::new(EventKind::Apogee, 8.0);
        let charge = FlightEvent::new(EventKind::EjectionCharge, 9.0)
            .with_source(ComponentRef::Motor(MotorId(0)));
        let sep = FlightEvent::new(EventKind::StageSeparation, 1.6).with_source(ComponentRef::Stage(0));
        let down = FlightEvent::altitude(20.0, 101.0, 99.0);
        let up = FlightEvent::altitude(3.0, 99.0, 101.0);

        assert!(DeployTrigger::Apogee.is_triggered_by(&apogee, 0, &r));
        assert!(DeployTrigger::Ejection.is_triggered_by(&charge, 0, &r));
        assert!(!DeployTrigger::Ejection.is_triggered_by(&charge, 1, &r));
        assert!(DeployTrigger::LowerStageSeparation.is_triggered_by(&sep, 0, &r));
        assert!(!DeployTrigger::LowerStageSeparation.is_triggered_by(&sep, 1, &r));
        assert!(DeployTrigger::Altitude(100.0).is_triggered_by(&down, 0, &r));
        assert!(!DeployTrigger::Altitude(100.0).is_triggered_by(&up, 0, &r));
        assert!(!DeployTrigger::Never.is_triggered_by(&apogee, 0, &r));
    }
}
