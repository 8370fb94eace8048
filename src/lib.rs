pub mod config;
pub mod error;
pub mod physics;
pub mod sim;
pub mod vehicle;

// Convenience re-exports
pub use config::SimOptions;
pub use error::{SimError, SimResult};
pub use sim::{simulate, FlightData, SimulationEngine};
pub use vehicle::{presets, Rocket, RocketBuilder};
