pub mod data;
pub mod engine;
pub mod event;
mod handler;
pub mod listener;
pub mod recovery;
pub mod rk4;
pub mod state;
pub mod status;
pub mod stepper;
pub mod warning;

pub use data::{DataTypeRegistry, FlightData, FlightDataBranch, FlightDataType, FlightSummary, UnitGroup};
pub use engine::{simulate, SimulationEngine};
pub use event::{ComponentRef, EventKind, EventQueue, FlightEvent};
pub use listener::{ListenerAction, ListenerSet, SimulationListener};
pub use status::{SimulationStatus, StepperKind};
pub use stepper::{Models, SimulationContext, SimulationStepper};
pub use warning::{Warning, WarningSet};
