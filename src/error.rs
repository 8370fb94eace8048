use std::fmt;

use nalgebra::{UnitQuaternion, Vector3};
use thiserror::Error;

/// Fatal failure of a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// The rocket carries no motor mounts at all.
    #[error("No motors defined")]
    NoMotorsDefined,

    /// The event queue ran dry (or passed the time limit) before any motor fired.
    #[error("No motors ignited")]
    NoMotorsIgnited,

    /// A motor burned out while the rocket was still sitting on the pad.
    #[error("Motor burnout without liftoff at t={time:.3} s")]
    BurnoutWithoutLiftoff { time: f64 },

    /// A kinematic or step-control quantity became NaN.
    #[error("Simulation resulted in not-a-number (NaN) value: {0}")]
    NotANumber(Box<StatusSnapshot>),

    /// Kinematics diverged beyond any physical meaning.
    #[error("Simulation values out of range: {0}")]
    ValuesOutOfRange(Box<StatusSnapshot>),

    /// The active configuration has no mass left.
    #[error("Active rocket mass is zero at t={time:.3} s")]
    ZeroMass { time: f64 },

    /// Simulation options or rocket definition are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Copy of the kinematic state at the moment a run was aborted.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub time: f64,
    pub previous_time_step: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub rotation: Vector3<f64>,
    pub effective_launch_rod_length: f64,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.orientation.quaternion();
        write!(
            f,
            "simulationTime={} previousTimeStep={} \
             rocketPosition=({}, {}, {}) rocketVelocity=({}, {}, {}) \
             rocketOrientationQuaternion=({}, {}, {}, {}) \
             rocketRotationVelocity=({}, {}, {}) effectiveLaunchRodLength={}",
            self.time,
            self.previous_time_step,
            self.position.x, self.position.y, self.position.z,
            self.velocity.x, self.velocity.y, self.velocity.z,
            q.w, q.i, q.j, q.k,
            self.rotation.x, self.rotation.y, self.rotation.z,
            self.effective_launch_rod_length,
        )
    }
}
