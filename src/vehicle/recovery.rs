use crate::sim::event::{EventKind, EventPayload, FlightEvent};
use crate::vehicle::rocket::Rocket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecoveryId(pub usize);

/// Which flight event deploys a recovery device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DeployTrigger {
    Launch,
    /// Ejection charge of a motor in the device's own stage.
    #[default]
    Ejection,
    Apogee,
    /// Descending through the given altitude (m above the launch site).
    Altitude(f64),
    /// Separation of the stage directly below the device's stage.
    /// STAGE_SEPARATION events are sourced from the stage that stays
    /// attached.
    LowerStageSeparation,
    Never,
}

impl DeployTrigger {
    pub fn is_triggered_by(&self, event: &FlightEvent, device_stage: usize, rocket: &Rocket) -> bool {
        let source_stage = event.source.and_then(|src| rocket.stage_of(src));
        match *self {
            DeployTrigger::Launch => event.kind == EventKind::Launch,
            DeployTrigger::Ejection => {
                event.kind == EventKind::EjectionCharge && source_stage == Some(device_stage)
            }
            DeployTrigger::Apogee => event.kind == EventKind::Apogee,
            DeployTrigger::Altitude(h) => match (event.kind, event.payload) {
                (EventKind::Altitude, Some(EventPayload::Altitude { old, new })) => old >= h && new <= h,
                _ => false,
            },
            DeployTrigger::LowerStageSeparation => {
                event.kind == EventKind::StageSeparation && source_stage == Some(device_stage)
            }
            DeployTrigger::Never => false,
        }
    }
}

/// Parachute or streamer. Drag coefficient may vary with Mach number.
#[derive(Debug, Clone)]
pub struct RecoveryDevice {
    pub id: RecoveryId,
    pub name: String,
    pub stage: usize,
    pub area: f64,                 // m^2, reference area of the canopy
    cd_table: Vec<(f64, f64)>,     // (Mach, CD), Mach ascending
    pub trigger: DeployTrigger,
    pub deploy_delay: f64,         // s
}

impl RecoveryDevice {
    /// Round canopy of the given diameter with a constant drag coefficient.
    pub fn parachute(name: impl Into<String>, stage: usize, diameter: f64, cd: f64) -> Self {
        Self {
            id: RecoveryId(0),
            name: name.into(),
            stage,
            area: std::f64::consts::PI * diameter * diameter / 4.0,
            cd_table: vec![(0.0, cd)],
            trigger: DeployTrigger::default(),
            deploy_delay: 0.0,
        }
    }

    /// Replace the drag model with a Mach-indexed table.
    pub fn with_cd_table(mut self, mut table: Vec<(f64, f64)>) -> Self {
        table.sort_by(|a, b| a.0.total_cmp(&b.0));
        if !table.is_empty() {
            self.cd_table = table;
        }
        self
    }

    pub fn deploy_on(mut self, trigger: DeployTrigger, delay: f64) -> Self {
        self.trigger = trigger;
        self.deploy_delay = delay;
        self
    }

    /// Drag coefficient at `mach`, linear between table points and held
    /// constant beyond the ends.
    pub fn drag_coefficient(&self, mach: f64) -> f64 {
        let (first, last) = match (self.cd_table.first(), self.cd_table.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return 0.0,
        };
        if mach <= first.0 {
            return first.1;
        }
        if mach >= last.0 {
            return last.1;
        }
        for w in self.cd_table.windows(2) {
            let (m0, c0) = w[0];
            let (m1, c1) = w[1];
            if mach <= m1 {
                return c0 + (c1 - c0) * (mach - m0) / (m1 - m0);
            }
        }
        last.1
    }
}
