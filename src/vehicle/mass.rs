use super::motor::MotorState;
use super::rocket::Configuration;

/// Mass properties of the attached stack at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassData {
    pub mass: f64,                 // kg
    pub cg: f64,                   // m from nose
    pub longitudinal_inertia: f64, // kg·m^2 about CG
    pub rotational_inertia: f64,   // kg·m^2 about body axis
}

/// Pure query: configuration + motor state at `time` → mass properties.
pub trait MassCalculator: Send {
    fn mass_data(&self, configuration: &Configuration, motors: &MotorState, time: f64) -> MassData;
}

/// Sums stage structures and motors as point-ish bodies along the axis,
/// moving each inertia to the common CG with the parallel-axis theorem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackMassCalculator;

struct Body {
    mass: f64,
    x: f64,
    i_long: f64,
    i_rot: f64,
}

impl MassCalculator for StackMassCalculator {
    fn mass_data(&self, configuration: &Configuration, motors: &MotorState, time: f64) -> MassData {
        let rocket = configuration.rocket();
        let mut bodies = Vec::new();

        for (i, stage) in configuration.active_stages() {
            bodies.push(Body {
                mass: stage.structure_mass,
                x: rocket.stage_offset(i) + stage.cg,
                i_long: stage.longitudinal_inertia,
                i_rot: stage.rotational_inertia,
            });
        }

        for mount in configuration.active_mounts() {
            let motor = &mount.motor;
            let t = motors.time_since_ignition(mount.id, time).unwrap_or(-1.0);
            let m = motor.mass(t);
            let r = motor.diameter() / 2.0;
            let l = motor.length();
            bodies.push(Body {
                mass: m,
                x: rocket.stage_offset(mount.stage) + mount.position + l / 2.0,
                i_long: m * (3.0 * r * r + l * l) / 12.0,
                i_rot: m * r * r / 2.0,
            });
        }

        let mass: f64 = bodies.iter().map(|b| b.mass).sum();
        if mass <= 0.0 {
            return MassData { mass: 0.0, cg: 0.0, longitudinal_inertia: 0.0, rotational_inertia: 0.0 };
        }
        let cg = bodies.iter().map(|b| b.mass * b.x).sum::<f64>() / mass;
        let longitudinal_inertia = bodies
            .iter()
            .map(|b| b.i_long + b.mass * (b.x - cg).powi(2))
            .sum();
        let rotational_inertia = bodies.iter().map(|b| b.i_rot).sum();

        MassData { mass, cg, longitudinal_inertia, rotational_inertia }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::motor::MotorId;
    use crate::vehicle::rocket::presets;
    use std::sync::Arc;

    #[test]
    fn unlit_single_stage_mass() {
        let cfg = Configuration::new(Arc::new(presets::single_stage()));
        let md = StackMassCalculator.mass_data(&cfg, &MotorState::default(), 0.0);
        assert!((md.mass - 0.59).abs() < 1e-12);
        // (0.5·0.55 + 0.09·0.95) / 0.59
        assert!((md.cg - 0.611_016_9).abs() < 1e-6);
        assert!(md.longitudinal_inertia > 0.04);
    }

    #[test]
    fn propellant_burns_off() {
        let cfg = Configuration::new(Arc::new(presets::single_stage()));
        let mut motors = MotorState::default();
        motors.ignite(MotorId(0), 0.0);
        let full = StackMassCalculator.mass_data(&cfg, &motors, 0.0);
        let empty = StackMassCalculator.mass_data(&cfg, &motors, 10.0);
        assert!((full.mass - empty.mass - 0.04).abs() < 1e-12);
        assert!(empty.cg < full.cg);
    }

    #[test]
    fn separation_removes_booster_mass() {
        let mut cfg = Configuration::new(Arc::new(presets::two_stage()));
        let motors = MotorState::default();
        let stacked = StackMassCalculator.mass_data(&cfg, &motors, 0.0);
        cfg.set_to_stage(0);
        let upper = StackMassCalculator.mass_data(&cfg, &motors, 0.0);
        assert!((stacked.mass - upper.mass - 0.29).abs() < 1e-12);
    }
}
