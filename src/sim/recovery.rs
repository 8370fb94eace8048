use nalgebra::Vector3;
use tracing::trace;

use super::data::FlightDataType;
use super::status::SimulationStatus;
use super::stepper::{record_common, CommonRow, SimulationContext, SimulationStepper, MIN_TIME_STEP};
use crate::error::{SimError, SimResult};

/// Largest velocity change allowed in one descent step, m/s.
const MAX_VELOCITY_CHANGE: f64 = 0.5;

/// Three-degree-of-freedom descent under deployed recovery devices.
/// Explicit first-order integration; attitude is frozen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryStepper;

impl SimulationStepper for RecoveryStepper {
    fn initialize(&mut self, status: &mut SimulationStatus) {
        status.state.rotation = Vector3::zeros();
    }

    fn step(
        &mut self,
        status: &mut SimulationStatus,
        ctx: &mut SimulationContext<'_>,
        max_step: f64,
    ) -> SimResult<()> {
        let altitude = ctx.options.launch_altitude + status.state.position.z;
        let atmosphere = ctx.models.atmosphere.conditions(altitude);
        let wind = ctx.models.wind.wind_velocity(status.time, altitude);

        let air = status.state.velocity - wind;
        let airspeed = air.norm();
        let mach = airspeed / atmosphere.speed_of_sound;

        let rocket = status.configuration.rocket();
        let cda: f64 = status
            .deployed()
            .iter()
            .filter_map(|id| rocket.recovery_device(*id))
            .map(|d| d.drag_coefficient(mach) * d.area)
            .sum();

        let mass = ctx.models.mass.mass_data(&status.configuration, &status.motors, status.time).mass;
        if mass <= 1e-6 {
            return Err(SimError::ZeroMass { time: status.time });
        }

        let drag_force = 0.5 * atmosphere.density * airspeed * airspeed * cda;
        let mut acceleration = if airspeed > 1e-9 { -air / airspeed * (drag_force / mass) } else { Vector3::zeros() };
        let gravity = ctx.models.gravity.gravity(ctx.options.launch_latitude, altitude);
        acceleration.z -= gravity;

        let a = acceleration.norm();
        let mut h = if a > 1e-9 { (MAX_VELOCITY_CHANGE / a).min(ctx.options.recovery_time_step) } else { ctx.options.recovery_time_step };
        h = h.min(max_step).max(MIN_TIME_STEP);
        trace!(t = status.time, h, "recovery step size");

        let v = status.state.velocity;
        status.state.position += v * h + acceleration * (h * h / 2.0);
        status.state.velocity += acceleration * h;
        status.time += h;
        status.previous_time_step = h;

        let row = CommonRow { acceleration, atmosphere, wind, gravity, mass, drag_force, mach };
        record_common(status, &row, ctx.options);
        let reference_area = status.configuration.reference_area();
        if reference_area > 0.0 {
            status.recorder.set_value(FlightDataType::DRAG_COEFF, cda / reference_area);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimOptions;
    use crate::sim::data::DataTypeRegistry;
    use crate::sim::listener::ListenerSet;
    use crate::sim::stepper::Models;
    use crate::vehicle::{presets, RecoveryId};
    use std::sync::Arc;

    fn descending(velocity: Vector3<f64>) -> SimulationStatus {
        let mut s = SimulationStatus::new(
            Arc::new(presets::single_stage()),
            &SimOptions::default(),
            Arc::new(DataTypeRegistry::new()),
        );
        s.state.position.z = 100.0;
        s.state.velocity = velocity;
        s.state.rotation = Vector3::new(0.0, 3.0, 0.0);
        s.deploy(RecoveryId(0));
        s
    }

    #[test]
    fn fast_deployment_takes_short_steps() {
        let opts = SimOptions::default();
        let mut models = Models::standard(&opts);
        let mut listeners = ListenerSet::new();
        let mut ctx = SimulationContext { options: &opts, models: &mut models, listeners: &mut listeners };
        let mut status = descending(Vector3::new(30.0, 0.0, 0.0));
        let mut stepper = RecoveryStepper;
        stepper.initialize(&mut status);
        assert_eq!(status.state.rotation, Vector3::zeros());

        stepper.step(&mut status, &mut ctx, f64::INFINITY).unwrap();
        let a = status.recorder.last(FlightDataType::ACCELERATION_TOTAL);
        assert!(a > 100.0, "canopy should brake hard, got {a}");
        assert!(status.previous_time_step <= MAX_VELOCITY_CHANGE / a + 1e-12);
        assert!(status.state.velocity.x < 30.0);
    }

    #[test]
    fn slow_descent_step_is_bounded() {
        let opts = SimOptions::default();
        let mut models = Models::standard(&opts);
        let mut listeners = ListenerSet::new();
        let mut ctx = SimulationContext { options: &opts, models: &mut models, listeners: &mut listeners };
        let mut status = descending(Vector3::new(0.0, 0.0, -6.0));
        let mut stepper = RecoveryStepper;

        stepper.step(&mut status, &mut ctx, f64::INFINITY).unwrap();
        let h = status.previous_time_step;
        assert!(h > MIN_TIME_STEP && h <= opts.recovery_time_step);
        assert!((status.time - h).abs() < 1e-12);

        stepper.step(&mut status, &mut ctx, 0.002).unwrap();
        assert!((status.previous_time_step - 0.002).abs() < 1e-12);
    }

    #[test]
    fn descent_settles_near_terminal_velocity() {
        let opts = SimOptions::default();
        let mut models = Models::standard(&opts);
        let mut listeners = ListenerSet::new();
        let mut ctx = SimulationContext { options: &opts, models: &mut models, listeners: &mut listeners };
        let mut status = descending(Vector3::new(0.0, 0.0, -20.0));
        status.state.position.z = 500.0;
        let mut stepper = RecoveryStepper;
        while status.time < 20.0 {
            stepper.step(&mut status, &mut ctx, f64::INFINITY).unwrap();
        }
        // 0.59 kg under a 0.6 m, CD 0.8 canopy
        let vz = status.state.velocity.z;
        assert!(vz < -5.0 && vz > -7.5, "vz = {vz}");
    }
}
