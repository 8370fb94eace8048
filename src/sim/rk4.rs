use nalgebra::{Rotation3, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use super::data::FlightDataType;
use super::state::{Derivative, RigidState};
use super::status::SimulationStatus;
use super::stepper::{record_common, CommonRow, SimulationContext, SimulationStepper, MIN_TIME_STEP};
use super::warning::{Warning, WarningSet};
use crate::error::{SimError, SimResult};
use crate::physics::{AerodynamicForces, FlightConditions};
use crate::vehicle::MassData;

const DEG: f64 = std::f64::consts::PI / 180.0;

/// Roll per step. Deliberately not a divisor of 360° so consecutive steps
/// sample different roll angles.
const MAX_ROLL_STEP_ANGLE: f64 = 28.32 * DEG;
const MAX_ROLL_RATE_CHANGE: f64 = 2.0 * DEG;
const MAX_PITCH_CHANGE: f64 = 4.0 * DEG;

/// Amplitude of the random pitch/yaw moment perturbation.
const PITCH_YAW_RANDOM: f64 = 0.0005;

const RANDOM_SEED_MIX: u64 = 0x23E3_A01F;

/// Mass below which the active configuration counts as empty, kg.
const MIN_MASS: f64 = 1e-6;

/// Side products of one derivative evaluation, kept for step control and
/// recording.
#[derive(Debug, Clone, Copy)]
struct StepData {
    thrust: f64,
    mass: MassData,
    conditions: FlightConditions,
    forces: AerodynamicForces,
    drag_force: f64,
    gravity: f64,
    wind: Vector3<f64>,
    lateral_pitch_rate: f64,
    lateral_pitch_acceleration: f64,
    roll_acceleration: f64,
}

/// Six-degree-of-freedom RK4 flight stepper. Each derivative evaluation
/// works on a fresh trial state; the status is written once per step.
#[derive(Debug, Clone)]
pub struct Rk4Stepper {
    random: ChaCha8Rng,
}

impl Rk4Stepper {
    pub fn new(seed: u64) -> Self {
        Self { random: ChaCha8Rng::seed_from_u64(seed ^ RANDOM_SEED_MIX) }
    }

    /// Evaluate the state derivative at `trial`, time `time`, with the
    /// given motor thrust.
    fn evaluate(
        &mut self,
        status: &SimulationStatus,
        trial: &RigidState,
        time: f64,
        thrust: f64,
        ctx: &mut SimulationContext<'_>,
        warnings: &mut WarningSet,
    ) -> SimResult<(Derivative, StepData)> {
        let config = &status.configuration;
        let altitude = ctx.options.launch_altitude + trial.position.z;
        let atmosphere = ctx.models.atmosphere.conditions(altitude);
        let wind = ctx.models.wind.wind_velocity(time, altitude);

        // airflow in the body frame
        let inverse = trial.orientation.inverse();
        let air = trial.velocity - wind;
        let airspeed = air.norm();
        let air_body = inverse * air;
        let lateral = air_body.x.hypot(air_body.y);
        let theta = if lateral > 1e-4 { air_body.y.atan2(air_body.x) } else { 0.0 };
        let aoa = if airspeed > 0.01 { (air_body.z / airspeed).clamp(-1.0, 1.0).acos() } else { 0.0 };

        // rates in the theta frame
        let rot_body = inverse * trial.rotation;
        let to_theta = Rotation3::from_axis_angle(&Vector3::z_axis(), -theta);
        let rot_theta = to_theta * rot_body;
        let (pitch_rate, yaw_rate) = if lateral < 0.001 { (0.0, 0.0) } else { (rot_theta.y, rot_theta.x) };

        let mut conditions = FlightConditions {
            time,
            velocity: airspeed,
            mach: airspeed / atmosphere.speed_of_sound,
            aoa,
            theta,
            roll_rate: rot_body.z,
            pitch_rate,
            yaw_rate,
            reference_length: config.reference_length(),
            reference_area: config.reference_area(),
            atmosphere,
        };
        if ctx.listeners.flight_conditions(&mut conditions) {
            warnings.add(Warning::ListenersAffected);
        }
        let lateral_pitch_rate = conditions.pitch_rate.hypot(conditions.yaw_rate);

        // aerodynamic warnings only count in settled, powered-up flight
        let mut scratch = WarningSet::new();
        let suppress = !status.launch_rod_cleared
            || time < status.start_warning_time
            || trial.velocity.z < 0.2 * status.max_z_velocity;
        let aero_warnings = if suppress { &mut scratch } else { &mut *warnings };
        let mut forces = ctx.models.aerodynamics.forces(config, &conditions, aero_warnings);

        forces.cm += PITCH_YAW_RANDOM * 2.0 * (self.random.gen::<f64>() - 0.5);
        forces.cyaw += PITCH_YAW_RANDOM * 2.0 * (self.random.gen::<f64>() - 0.5);
        if ctx.listeners.force_calc(&conditions, &mut forces) {
            warnings.add(Warning::ListenersAffected);
        }

        let mass = ctx.models.mass.mass_data(config, &status.motors, time);
        if mass.mass <= MIN_MASS {
            return Err(SimError::ZeroMass { time });
        }

        let q = conditions.dynamic_pressure();
        let ref_area = conditions.reference_area;
        let ref_len = conditions.reference_length;
        let drag_force = forces.caxial * q * ref_area;
        let normal_force = forces.cn * q * ref_area;
        let side_force = forces.cside * q * ref_area;

        let from_theta = Rotation3::from_axis_angle(&Vector3::z_axis(), theta);
        let acc_theta = Vector3::new(
            -normal_force / mass.mass,
            -side_force / mass.mass,
            (thrust - drag_force) / mass.mass,
        );
        let gravity = ctx.models.gravity.gravity(ctx.options.launch_latitude, altitude);
        let mut acceleration = trial.orientation * (from_theta * acc_theta);
        acceleration.z -= gravity;

        let angular_acceleration;
        let lateral_pitch_acceleration;
        let roll_acceleration;
        let lateral_pitch_rate = if status.launch_rod_cleared {
            // shift moments from the nose to the CG
            let (cm, cyaw) = if ref_len > 0.0 {
                (forces.cm - forces.cn * mass.cg / ref_len, forces.cyaw - forces.cside * mass.cg / ref_len)
            } else {
                (forces.cm, forces.cyaw)
            };
            let scale = q * ref_area * ref_len;
            let moment = Vector3::new(-cyaw * scale, cm * scale, forces.croll * scale);
            let alpha_theta = Vector3::new(
                moment.x / mass.longitudinal_inertia,
                moment.y / mass.longitudinal_inertia,
                moment.z / mass.rotational_inertia,
            );
            roll_acceleration = alpha_theta.z;
            lateral_pitch_acceleration = alpha_theta.x.abs().max(alpha_theta.y.abs());
            angular_acceleration = trial.orientation * (from_theta * alpha_theta);
            lateral_pitch_rate
        } else {
            // the guide only lets the rocket slide along it
            let dir = status.launch_rod_direction;
            acceleration = dir * acceleration.dot(&dir);
            angular_acceleration = Vector3::zeros();
            lateral_pitch_acceleration = 0.0;
            roll_acceleration = 0.0;
            0.0
        };

        let derivative = Derivative {
            velocity: trial.velocity,
            acceleration,
            rotation: trial.rotation,
            angular_acceleration,
        };
        let data = StepData {
            thrust,
            mass,
            conditions,
            forces,
            drag_force,
            gravity,
            wind,
            lateral_pitch_rate,
            lateral_pitch_acceleration,
            roll_acceleration,
        };
        Ok((derivative, data))
    }

    fn record(status: &mut SimulationStatus, data: &StepData, acceleration: Vector3<f64>, ctx: &SimulationContext<'_>) {
        let common = CommonRow {
            acceleration,
            atmosphere: data.conditions.atmosphere,
            wind: data.wind,
            gravity: data.gravity,
            mass: data.mass.mass,
            drag_force: data.drag_force,
            mach: data.conditions.mach,
        };
        record_common(status, &common, ctx.options);

        let c = &data.conditions;
        let f = &data.forces;
        let nose = status.state.body_z();
        let body_length = status.configuration.length();
        let rec = &mut status.recorder;

        rec.set_value(FlightDataType::AOA, c.aoa);
        rec.set_value(FlightDataType::ROLL_RATE, c.roll_rate);
        rec.set_value(FlightDataType::PITCH_RATE, c.pitch_rate);
        rec.set_value(FlightDataType::YAW_RATE, c.yaw_rate);

        rec.set_value(FlightDataType::LONGITUDINAL_INERTIA, data.mass.longitudinal_inertia);
        rec.set_value(FlightDataType::ROTATIONAL_INERTIA, data.mass.rotational_inertia);
        rec.set_value(FlightDataType::CP_LOCATION, f.cp);
        rec.set_value(FlightDataType::CG_LOCATION, data.mass.cg);
        if c.reference_length > 0.0 {
            rec.set_value(FlightDataType::STABILITY, (f.cp - data.mass.cg) / c.reference_length);
        }

        rec.set_value(FlightDataType::THRUST_FORCE, data.thrust);
        rec.set_value(FlightDataType::DRAG_COEFF, f.cd);
        rec.set_value(FlightDataType::AXIAL_DRAG_COEFF, f.caxial);
        rec.set_value(FlightDataType::NORMAL_FORCE_COEFF, f.cn);
        rec.set_value(FlightDataType::PITCH_MOMENT_COEFF, f.cm);
        rec.set_value(FlightDataType::YAW_MOMENT_COEFF, f.cyaw);
        rec.set_value(FlightDataType::SIDE_FORCE_COEFF, f.cside);
        rec.set_value(FlightDataType::ROLL_MOMENT_COEFF, f.croll);
        rec.set_value(FlightDataType::ROLL_FORCING_COEFF, f.croll_force);
        rec.set_value(FlightDataType::ROLL_DAMPING_COEFF, f.croll_damp);
        rec.set_value(FlightDataType::REFERENCE_LENGTH, c.reference_length);
        rec.set_value(FlightDataType::REFERENCE_AREA, c.reference_area);

        if ctx.options.calculate_extras {
            rec.set_value(FlightDataType::REYNOLDS_NUMBER, c.reynolds_number(body_length));
            rec.set_value(FlightDataType::ORIENTATION_VERTICAL, nose.z.clamp(-1.0, 1.0).acos());
            rec.set_value(FlightDataType::ORIENTATION_AZIMUTH, nose.x.atan2(nose.y));
        }
    }
}

/// Total thrust of the burning motors, averaged over `[time, time + dt]`.
fn thrust(status: &SimulationStatus, time: f64, dt: f64) -> f64 {
    status
        .configuration
        .active_mounts()
        .filter_map(|m| {
            status
                .motors
                .time_since_ignition(m.id, time)
                .map(|t| m.motor.average_thrust(t, dt))
        })
        .sum()
}

/// Time to move `limit` at `rate`; unbounded when the rate is negligible.
fn step_limit(limit: f64, rate: f64) -> f64 {
    if rate.abs() < 1e-12 {
        f64::INFINITY
    } else {
        (limit / rate).abs()
    }
}

impl SimulationStepper for Rk4Stepper {
    fn step(
        &mut self,
        status: &mut SimulationStatus,
        ctx: &mut SimulationContext<'_>,
        max_step: f64,
    ) -> SimResult<()> {
        let mut warnings = WarningSet::new();
        let t = status.time;
        let start = status.state;

        let estimate_dt =
            if status.previous_time_step > 0.0 { status.previous_time_step } else { ctx.options.time_step };
        let thrust_estimate = thrust(status, t, estimate_dt);
        let (mut k1, mut data) = self.evaluate(status, &start, t, thrust_estimate, ctx, &mut warnings)?;

        // step size
        let mut h = ctx.options.time_step.max(MIN_TIME_STEP);
        h = h
            .min(max_step)
            .min(step_limit(ctx.options.max_step_angle, data.lateral_pitch_rate))
            .min(step_limit(MAX_ROLL_STEP_ANGLE, data.conditions.roll_rate))
            .min(step_limit(MAX_ROLL_RATE_CHANGE, data.roll_acceleration))
            .min(step_limit(MAX_PITCH_CHANGE, data.lateral_pitch_acceleration));
        if !status.launch_rod_cleared {
            let v = start.velocity.norm();
            if v > 0.0 {
                h = h.min(status.effective_launch_rod_length / v / 10.0);
            }
        }
        let previous = status.previous_time_step;
        if previous > 0.0 && h > previous {
            h = 0.3 * h + 0.7 * previous;
        }
        h = h.min(max_step).max(MIN_TIME_STEP);
        trace!(t, h, max_step, "rk4 step size");

        let thrust_now = thrust(status, t, h);
        if (thrust_now - thrust_estimate).abs() > 0.1 * thrust_estimate.abs() + 0.001 {
            debug!(t, estimate = thrust_estimate, thrust = thrust_now, "thrust re-estimated");
            (k1, data) = self.evaluate(status, &start, t, thrust_now, ctx, &mut warnings)?;
        }

        let (k2, _) = self.evaluate(status, &start.advanced(&k1, h / 2.0), t + h / 2.0, thrust_now, ctx, &mut warnings)?;
        let (k3, _) = self.evaluate(status, &start.advanced(&k2, h / 2.0), t + h / 2.0, thrust_now, ctx, &mut warnings)?;
        let (k4, _) = self.evaluate(status, &start.advanced(&k3, h), t + h, thrust_now, ctx, &mut warnings)?;
        let combined = Derivative::rk4(&k1, &k2, &k3, &k4);

        status.state = start.advanced(&combined, h);
        status.time = t + h;
        status.previous_time_step = h;
        status.max_z_velocity = status.max_z_velocity.max(status.state.velocity.z);

        Self::record(status, &data, combined.acceleration, ctx);
        status.warnings.extend(warnings);
        Ok(())
    }
}
