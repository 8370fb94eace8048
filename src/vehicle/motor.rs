use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::Arc;

use crate::sim::event::{EventKind, FlightEvent};
use crate::vehicle::rocket::Rocket;

// ---------------------------------------------------------------------------
// Motor model
// ---------------------------------------------------------------------------

/// A rocket motor as seen by the engine: thrust and mass as functions of
/// time since ignition.
pub trait Motor: Debug + Send + Sync {
    fn designation(&self) -> &str;

    /// Time from ignition to burnout, s.
    fn burn_time(&self) -> f64;

    /// Mean thrust over `[t, t + dt]` where `t` is time since ignition.
    /// `dt <= 0` yields the instantaneous thrust.
    fn average_thrust(&self, time_since_ignition: f64, dt: f64) -> f64;

    /// Total mass at `time_since_ignition` (negative = not yet ignited).
    fn mass(&self, time_since_ignition: f64) -> f64;

    fn launch_mass(&self) -> f64;

    fn burnout_mass(&self) -> f64;

    fn length(&self) -> f64;

    fn diameter(&self) -> f64;
}

/// Motor defined by a piecewise-linear thrust curve.
#[derive(Debug, Clone)]
pub struct ThrustCurveMotor {
    pub designation: String,
    points: Vec<(f64, f64)>, // (time since ignition s, thrust N), time strictly increasing
    total_impulse: f64,
    pub launch_mass: f64,    // kg
    pub burnout_mass: f64,   // kg
    pub length: f64,         // m
    pub diameter: f64,       // m
}

impl ThrustCurveMotor {
    /// Build from curve points. The curve is forced to start at t=0 and
    /// thrust is zero outside the last point.
    pub fn new(
        designation: impl Into<String>,
        points: Vec<(f64, f64)>,
        launch_mass: f64,
        burnout_mass: f64,
        length: f64,
        diameter: f64,
    ) -> Self {
        let mut pts: Vec<(f64, f64)> = points
            .into_iter()
            .filter(|(t, f)| t.is_finite() && f.is_finite() && *t >= 0.0)
            .map(|(t, f)| (t, f.max(0.0)))
            .collect();
        pts.sort_by(|a, b| a.0.total_cmp(&b.0));
        pts.dedup_by(|b, a| b.0 == a.0);
        if pts.first().map_or(true, |p| p.0 > 0.0) {
            pts.insert(0, (0.0, 0.0));
        }

        let mut motor = Self {
            designation: designation.into(),
            points: pts,
            total_impulse: 0.0,
            launch_mass,
            burnout_mass: burnout_mass.min(launch_mass),
            length,
            diameter,
        };
        motor.total_impulse = motor.impulse_between(0.0, motor.burn_time());
        motor
    }

    pub fn total_impulse(&self) -> f64 {
        self.total_impulse
    }

    fn thrust_at(&self, t: f64) -> f64 {
        let last = match self.points.last() {
            Some(p) => *p,
            None => return 0.0,
        };
        if t < 0.0 || t > last.0 {
            return 0.0;
        }
        for w in self.points.windows(2) {
            let (t0, f0) = w[0];
            let (t1, f1) = w[1];
            if t <= t1 {
                let frac = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };
                return f0 + (f1 - f0) * frac;
            }
        }
        last.1
    }

    /// Exact integral of the linear-segment curve over `[a, b]`.
    fn impulse_between(&self, a: f64, b: f64) -> f64 {
        if b <= a {
            return 0.0;
        }
        let mut impulse = 0.0;
        for w in self.points.windows(2) {
            let lo = w[0].0.max(a);
            let hi = w[1].0.min(b);
            if hi > lo {
                impulse += 0.5 * (self.thrust_at(lo) + self.thrust_at(hi)) * (hi - lo);
            }
        }
        impulse
    }
}

impl Motor for ThrustCurveMotor {
    fn designation(&self) -> &str {
        &self.designation
    }

    fn burn_time(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.0)
    }

    fn average_thrust(&self, time_since_ignition: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return self.thrust_at(time_since_ignition);
        }
        self.impulse_between(time_since_ignition, time_since_ignition + dt) / dt
    }

    fn mass(&self, time_since_ignition: f64) -> f64 {
        if time_since_ignition <= 0.0 || self.total_impulse <= 0.0 {
            return self.launch_mass;
        }
        // propellant burns in proportion to delivered impulse
        let burned = self.impulse_between(0.0, time_since_ignition) / self.total_impulse;
        let propellant = self.launch_mass - self.burnout_mass;
        self.launch_mass - propellant * burned.clamp(0.0, 1.0)
    }

    fn launch_mass(&self) -> f64 {
        self.launch_mass
    }

    fn burnout_mass(&self) -> f64 {
        self.burnout_mass
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn diameter(&self) -> f64 {
        self.diameter
    }
}

// ---------------------------------------------------------------------------
// Motor mounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MotorId(pub usize);

/// Which flight event lights a motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IgnitionTrigger {
    /// At launch for the bottom stage, otherwise at the ejection charge
    /// of the stage directly below.
    #[default]
    Automatic,
    Launch,
    /// Ejection charge of the stage directly below.
    EjectionCharge,
    /// Burnout of the stage directly below.
    Burnout,
    Never,
}

impl IgnitionTrigger {
    /// Whether `event` lights a motor mounted in `mount_stage`.
    pub fn is_triggered_by(&self, event: &FlightEvent, mount_stage: usize, rocket: &Rocket) -> bool {
        let from_stage_below = |kind: EventKind| {
            event.kind == kind
                && event
                    .source
                    .and_then(|src| rocket.stage_of(src))
                    .map_or(false, |stage| stage == mount_stage + 1)
        };
        match self {
            IgnitionTrigger::Automatic => {
                (event.kind == EventKind::Launch && mount_stage == rocket.bottom_stage())
                    || from_stage_below(EventKind::EjectionCharge)
            }
            IgnitionTrigger::Launch => event.kind == EventKind::Launch,
            IgnitionTrigger::EjectionCharge => from_stage_below(EventKind::EjectionCharge),
            IgnitionTrigger::Burnout => from_stage_below(EventKind::Burnout),
            IgnitionTrigger::Never => false,
        }
    }
}

/// Ejection charge timing after burnout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EjectionDelay {
    Seconds(f64),
    Plugged,
}

/// A motor installed in a stage.
#[derive(Debug, Clone)]
pub struct MotorMount {
    pub id: MotorId,
    pub stage: usize,
    pub position: f64, // m, motor forward end from stage top
    pub motor: Arc<dyn Motor>,
    pub ignition: IgnitionTrigger,
    pub ignition_delay: f64, // s
    pub ejection_delay: EjectionDelay,
}

impl MotorMount {
    /// New mount; the id is assigned when the mount is added to a rocket.
    pub fn new(stage: usize, position: f64, motor: Arc<dyn Motor>) -> Self {
        Self {
            id: MotorId(0),
            stage,
            position,
            motor,
            ignition: IgnitionTrigger::Automatic,
            ignition_delay: 0.0,
            ejection_delay: EjectionDelay::Plugged,
        }
    }

    pub fn ignition(mut self, trigger: IgnitionTrigger, delay: f64) -> Self {
        self.ignition = trigger;
        self.ignition_delay = delay;
        self
    }

    pub fn ejection_delay(mut self, delay: EjectionDelay) -> Self {
        self.ejection_delay = delay;
        self
    }
}

// ---------------------------------------------------------------------------
// Per-run motor bookkeeping
// ---------------------------------------------------------------------------

/// Ignition and burnout bookkeeping for one simulation run.
#[derive(Debug, Clone, Default)]
pub struct MotorState {
    ignition_times: BTreeMap<MotorId, f64>,
    burnt_out: BTreeSet<MotorId>,
}

impl MotorState {
    /// Record ignition. Returns false (and keeps the first timestamp) when
    /// the motor was already lit.
    pub fn ignite(&mut self, id: MotorId, time: f64) -> bool {
        if self.ignition_times.contains_key(&id) {
            return false;
        }
        self.ignition_times.insert(id, time);
        true
    }

    pub fn ignition_time(&self, id: MotorId) -> Option<f64> {
        self.ignition_times.get(&id).copied()
    }

    pub fn is_ignited(&self, id: MotorId) -> bool {
        self.ignition_times.contains_key(&id)
    }

    pub fn any_ignited(&self) -> bool {
        !self.ignition_times.is_empty()
    }

    pub fn mark_burnout(&mut self, id: MotorId) {
        self.burnt_out.insert(id);
    }

    pub fn is_burnt_out(&self, id: MotorId) -> bool {
        self.burnt_out.contains(&id)
    }

    /// Lit and not yet burnt out.
    pub fn is_burning(&self, id: MotorId) -> bool {
        self.is_ignited(id) && !self.is_burnt_out(id)
    }

    /// Seconds since ignition, or `None` when unlit.
    pub fn time_since_ignition(&self, id: MotorId, time: f64) -> Option<f64> {
        self.ignition_time(id).map(|t0| time - t0)
    }
}
