use nalgebra::Vector3;

use super::data::FlightDataType;
use super::listener::ListenerSet;
use super::status::SimulationStatus;
use crate::config::SimOptions;
use crate::error::SimResult;
use crate::physics::{
    AerodynamicCalculator, AtmosphericConditions, AtmosphericModel, BodyAerodynamics, ConstantWind,
    GravityModel, IsaAtmosphere, TurbulentWind, WgsGravity, WindModel,
};
use crate::vehicle::{MassCalculator, StackMassCalculator};

/// Smallest step either stepper takes, s.
pub const MIN_TIME_STEP: f64 = 0.001;

/// External models consulted during a run.
pub struct Models {
    pub atmosphere: Box<dyn AtmosphericModel>,
    pub wind: Box<dyn WindModel>,
    pub gravity: Box<dyn GravityModel>,
    pub aerodynamics: Box<dyn AerodynamicCalculator>,
    pub mass: Box<dyn MassCalculator>,
}

impl Models {
    /// ISA atmosphere, WGS gravity, the linear body model and the stack
    /// mass model. Wind gusts when `wind_turbulence` is positive.
    pub fn standard(options: &SimOptions) -> Self {
        let wind: Box<dyn WindModel> = if options.wind_turbulence > 0.0 {
            Box::new(TurbulentWind::new(
                options.wind_average,
                options.wind_turbulence,
                options.wind_direction,
                options.random_seed,
            ))
        } else {
            Box::new(ConstantWind::new(options.wind_average, options.wind_direction))
        };
        Self {
            atmosphere: Box::new(IsaAtmosphere::default()),
            wind,
            gravity: Box::new(WgsGravity),
            aerodynamics: Box::new(BodyAerodynamics),
            mass: Box::new(StackMassCalculator),
        }
    }
}

/// Borrowed run-wide collaborators handed to a stepper for one step.
pub struct SimulationContext<'a> {
    pub options: &'a SimOptions,
    pub models: &'a mut Models,
    pub listeners: &'a mut ListenerSet,
}

/// One integration scheme. The engine selects the implementation from
/// [`SimulationStatus::stepper_kind`] and calls `initialize` on a switch.
pub trait SimulationStepper {
    fn initialize(&mut self, _status: &mut SimulationStatus) {}

    /// Advance `status` by one step no longer than `max_step`.
    fn step(
        &mut self,
        status: &mut SimulationStatus,
        ctx: &mut SimulationContext<'_>,
        max_step: f64,
    ) -> SimResult<()>;
}

/// Values both steppers record on every row.
pub(crate) struct CommonRow {
    pub acceleration: Vector3<f64>,
    pub atmosphere: AtmosphericConditions,
    pub wind: Vector3<f64>,
    pub gravity: f64,
    pub mass: f64,
    pub drag_force: f64,
    pub mach: f64,
}

/// Start a recorder row for the post-step status and fill the kinematic,
/// atmospheric and bookkeeping series.
pub(crate) fn record_common(status: &mut SimulationStatus, row: &CommonRow, options: &SimOptions) {
    let pos = status.relative_position();
    let vel = status.state.velocity;
    let acc = row.acceleration;
    let rec = &mut status.recorder;

    rec.add_point();
    rec.set_value(FlightDataType::TIME, status.time);
    rec.set_value(FlightDataType::ALTITUDE, pos.z);
    rec.set_value(FlightDataType::VELOCITY_Z, vel.z);
    rec.set_value(FlightDataType::ACCELERATION_Z, acc.z);
    rec.set_value(FlightDataType::VELOCITY_TOTAL, vel.norm());
    rec.set_value(FlightDataType::ACCELERATION_TOTAL, acc.norm());

    if options.calculate_extras {
        rec.set_value(FlightDataType::POSITION_X, pos.x);
        rec.set_value(FlightDataType::POSITION_Y, pos.y);
        rec.set_value(FlightDataType::POSITION_XY, pos.x.hypot(pos.y));
        rec.set_value(FlightDataType::VELOCITY_XY, vel.x.hypot(vel.y));
        rec.set_value(FlightDataType::ACCELERATION_XY, acc.x.hypot(acc.y));
    }

    rec.set_value(FlightDataType::MASS, row.mass);
    rec.set_value(FlightDataType::DRAG_FORCE, row.drag_force);
    rec.set_value(FlightDataType::MACH_NUMBER, row.mach);
    rec.set_value(FlightDataType::WIND_VELOCITY, row.wind.norm());
    rec.set_value(FlightDataType::AIR_TEMPERATURE, row.atmosphere.temperature);
    rec.set_value(FlightDataType::AIR_PRESSURE, row.atmosphere.pressure);
    rec.set_value(FlightDataType::SPEED_OF_SOUND, row.atmosphere.speed_of_sound);
    rec.set_value(FlightDataType::GRAVITY, row.gravity);
    rec.set_value(FlightDataType::TIME_STEP, status.previous_time_step);
    rec.set_value(FlightDataType::COMPUTATION_TIME, status.started.elapsed().as_secs_f64());
}
