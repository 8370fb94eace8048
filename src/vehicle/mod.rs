pub mod mass;
pub mod motor;
pub mod recovery;
pub mod rocket;
pub mod stage;

pub use mass::{MassCalculator, MassData, StackMassCalculator};
pub use motor::{EjectionDelay, IgnitionTrigger, Motor, MotorId, MotorMount, MotorState, ThrustCurveMotor};
pub use recovery::{DeployTrigger, RecoveryDevice, RecoveryId};
pub use rocket::{presets, Configuration, Rocket, RocketBuilder};
pub use stage::{Stage, StageBuilder};
