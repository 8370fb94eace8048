pub mod aerodynamics;
pub mod atmosphere;
pub mod gravity;
pub mod wind;

pub use aerodynamics::{AerodynamicCalculator, AerodynamicForces, BodyAerodynamics, FlightConditions};
pub use atmosphere::{AtmosphericConditions, AtmosphericModel, IsaAtmosphere};
pub use gravity::{ConstantGravity, GravityModel, WgsGravity};
pub use wind::{ConstantWind, TurbulentWind, WindModel};
