use crate::physics::atmosphere::AtmosphericConditions;
use crate::sim::warning::{Warning, WarningSet};
use crate::vehicle::Configuration;

/// AoA above which the linear normal-force model is flagged as unreliable.
const LARGE_AOA: f64 = 17.5 * std::f64::consts::PI / 180.0;

// ---------------------------------------------------------------------------
// Flight conditions (input to the calculator)
// ---------------------------------------------------------------------------

/// Derived scalar state at one derivative evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightConditions {
    pub time: f64,
    pub velocity: f64,         // airspeed, m/s
    pub mach: f64,
    pub aoa: f64,              // rad
    pub theta: f64,            // rad, body-frame azimuth of the lateral airflow
    pub roll_rate: f64,        // rad/s
    pub pitch_rate: f64,       // rad/s
    pub yaw_rate: f64,         // rad/s
    pub reference_length: f64, // m
    pub reference_area: f64,   // m^2
    pub atmosphere: AtmosphericConditions,
}

impl FlightConditions {
    pub fn dynamic_pressure(&self) -> f64 {
        0.5 * self.atmosphere.density * self.velocity * self.velocity
    }

    /// Reynolds number over `length`.
    pub fn reynolds_number(&self, length: f64) -> f64 {
        self.velocity * length / self.atmosphere.kinematic_viscosity
    }
}

// ---------------------------------------------------------------------------
// Aerodynamic coefficients (output of the calculator)
// ---------------------------------------------------------------------------

/// Coefficients referenced to the configuration's reference area/length.
/// Moments are taken about the nose tip; the stepper shifts them to the CG.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AerodynamicForces {
    pub cd: f64,
    pub caxial: f64,
    pub cn: f64,
    pub cm: f64,
    pub cside: f64,
    pub cyaw: f64,
    pub croll: f64,
    pub croll_force: f64,
    pub croll_damp: f64,
    pub cp: f64, // m from nose
    pub cn_alpha: f64,
}

/// Pure query: conditions → force and moment coefficients.
pub trait AerodynamicCalculator: Send {
    fn forces(
        &self,
        configuration: &Configuration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces;
}

/// Linear per-stage model: CN = ΣCNα·sin(α) acting at the CNα-weighted CP,
/// constant zero-AoA drag, rate damping proportional to rate·length/V.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyAerodynamics;

impl AerodynamicCalculator for BodyAerodynamics {
    fn forces(
        &self,
        configuration: &Configuration,
        conditions: &FlightConditions,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces {
        let rocket = configuration.rocket();
        let ref_len = conditions.reference_length;
        if ref_len <= 0.0 {
            return AerodynamicForces::default();
        }

        let mut cd = 0.0;
        let mut cn_alpha = 0.0;
        let mut cp_moment = 0.0;
        let mut pitch_damping = 0.0;
        let mut roll_damping = 0.0;
        let mut roll_forcing = 0.0;
        for (i, stage) in configuration.active_stages() {
            cd += stage.cd;
            cn_alpha += stage.cn_alpha;
            cp_moment += stage.cn_alpha * (rocket.stage_offset(i) + stage.cp);
            pitch_damping += stage.pitch_damping;
            roll_damping += stage.roll_damping;
            roll_forcing += stage.roll_forcing;
        }
        let cp = if cn_alpha > 0.0 { cp_moment / cn_alpha } else { 0.0 };

        let aoa = conditions.aoa;
        if aoa > LARGE_AOA {
            warnings.add(Warning::LargeAngleOfAttack(aoa));
        }

        let cn = cn_alpha * aoa.sin();
        let mut cm = cn * cp / ref_len;
        let mut cyaw = 0.0;

        let mut croll_damp = 0.0;
        if conditions.velocity > 1e-3 {
            let rate_scale = configuration.length() / conditions.velocity;
            cm -= pitch_damping * conditions.pitch_rate * rate_scale;
            cyaw += pitch_damping * conditions.yaw_rate * rate_scale;
            croll_damp = roll_damping * conditions.roll_rate * rate_scale;
        }

        AerodynamicForces {
            cd,
            caxial: cd * aoa.cos(),
            cn,
            cm,
            cside: 0.0,
            cyaw,
            croll: roll_forcing - croll_damp,
            croll_force: roll_forcing,
            croll_damp,
            cp,
            cn_alpha,
        }
    }
}
