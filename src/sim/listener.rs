use super::event::{EventKind, FlightEvent};
use super::status::SimulationStatus;
use super::warning::Warning;
use crate::error::SimError;
use crate::physics::{AerodynamicForces, FlightConditions};

/// What a listener asks the engine to do after a callback.
#[derive(Debug, Clone, Default)]
pub struct ListenerAction {
    /// Events to add to the queue.
    pub events: Vec<FlightEvent>,
    /// Stop the run at the current time.
    pub end_simulation: bool,
}

impl ListenerAction {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn end() -> Self {
        Self { events: Vec::new(), end_simulation: true }
    }

    pub fn event(event: FlightEvent) -> Self {
        Self { events: vec![event], end_simulation: false }
    }
}

/// Observer hooked into the run loop. Every method has a no-op default.
///
/// Step and event hooks may mutate the status directly. Flight conditions
/// and aerodynamic coefficients are handed out by `&mut` during each
/// derivative evaluation; any change flags the run as listener-affected.
pub trait SimulationListener: Send {
    fn start_simulation(&mut self, _status: &mut SimulationStatus) -> ListenerAction {
        ListenerAction::none()
    }

    fn pre_step(&mut self, _status: &mut SimulationStatus) -> ListenerAction {
        ListenerAction::none()
    }

    fn post_step(&mut self, _status: &mut SimulationStatus) -> ListenerAction {
        ListenerAction::none()
    }

    fn on_event(&mut self, _event: &FlightEvent, _status: &SimulationStatus) -> ListenerAction {
        ListenerAction::none()
    }

    fn on_flight_conditions(&mut self, _conditions: &mut FlightConditions) {}

    fn on_force_calc(&mut self, _conditions: &FlightConditions, _forces: &mut AerodynamicForces) {}

    fn end_simulation(&mut self, _status: &SimulationStatus, _error: Option<&SimError>) {}
}

/// Listeners in registration order.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Box<dyn SimulationListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: Box<dyn SimulationListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn start_simulation(&mut self, status: &mut SimulationStatus) -> bool {
        self.dispatch(status, |l, s| l.start_simulation(s))
    }

    pub fn pre_step(&mut self, status: &mut SimulationStatus) -> bool {
        self.dispatch(status, |l, s| l.pre_step(s))
    }

    pub fn post_step(&mut self, status: &mut SimulationStatus) -> bool {
        self.dispatch(status, |l, s| l.post_step(s))
    }

    pub fn on_event(&mut self, event: &FlightEvent, status: &mut SimulationStatus) -> bool {
        self.dispatch(status, |l, s| l.on_event(event, s))
    }

    /// Returns true when any listener changed the conditions.
    pub fn flight_conditions(&mut self, conditions: &mut FlightConditions) -> bool {
        let before = *conditions;
        for l in &mut self.listeners {
            l.on_flight_conditions(conditions);
        }
        *conditions != before
    }

    /// Returns true when any listener changed the coefficients.
    pub fn force_calc(&mut self, conditions: &FlightConditions, forces: &mut AerodynamicForces) -> bool {
        let before = *forces;
        for l in &mut self.listeners {
            l.on_force_calc(conditions, forces);
        }
        *forces != before
    }

    pub fn end_simulation(&mut self, status: &SimulationStatus, error: Option<&SimError>) {
        for l in &mut self.listeners {
            l.end_simulation(status, error);
        }
    }

    /// Run one hook on every listener and apply the returned actions.
    /// Returns true when any listener asked to end the run.
    fn dispatch<F>(&mut self, status: &mut SimulationStatus, mut hook: F) -> bool
    where
        F: FnMut(&mut Box<dyn SimulationListener>, &mut SimulationStatus) -> ListenerAction,
    {
        let mut end = false;
        for l in &mut self.listeners {
            let action = hook(l, status);
            if !action.events.is_empty() {
                status.warnings.add(Warning::ListenersAffected);
            }
            for event in action.events {
                status.add_event(event);
            }
            if action.end_simulation {
                status.add_event(FlightEvent::new(EventKind::SimulationEnd, status.time));
                end = true;
            }
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimOptions;
    use crate::sim::data::DataTypeRegistry;
    use crate::vehicle::presets;
    use std::sync::Arc;

    fn status() -> SimulationStatus {
        SimulationStatus::new(
            Arc::new(presets::single_stage()),
            &SimOptions::default(),
            Arc::new(DataTypeRegistry::new()),
        )
    }

    struct Injector;

    impl SimulationListener for Injector {
        fn pre_step(&mut self, status: &mut SimulationStatus) -> ListenerAction {
            ListenerAction::event(FlightEvent::new(EventKind::Apogee, status.time + 1.0))
        }

        fn on_flight_conditions(&mut self, conditions: &mut FlightConditions) {
            conditions.velocity *= 2.0;
        }
    }

    struct Stopper;

    impl SimulationListener for Stopper {
        fn post_step(&mut self, _status: &mut SimulationStatus) -> ListenerAction {
            ListenerAction::end()
        }
    }

    #[test]
    fn injected_events_flag_the_run() {
        let mut set = ListenerSet::new();
        set.push(Box::new(Injector));
        let mut s = status();
        assert!(!set.pre_step(&mut s));
        assert_eq!(s.queue.len(), 1);
        assert_eq!(s.queue.peek().map(|e| e.kind), Some(EventKind::Apogee));
        assert!(s.warnings.contains(|w| *w == Warning::ListenersAffected));
    }

    #[test]
    fn end_request_queues_simulation_end() {
        let mut set = ListenerSet::new();
        set.push(Box::new(Stopper));
        let mut s = status();
        s.time = 3.0;
        assert!(set.post_step(&mut s));
        let e = s.queue.pop().expect("end event queued");
        assert_eq!((e.kind, e.time), (EventKind::SimulationEnd, 3.0));
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn passive_listener_changes_nothing() {
        struct Passive;
        impl SimulationListener for Passive {}

        let mut set = ListenerSet::new();
        set.push(Box::new(Passive));
        let mut forces = AerodynamicForces { cd: 0.5, ..Default::default() };
        let conditions = FlightConditions {
            time: 0.0,
            velocity: 30.0,
            mach: 30.0 / 340.3,
            aoa: 0.0,
            theta: 0.0,
            roll_rate: 0.0,
            pitch_rate: 0.0,
            yaw_rate: 0.0,
            reference_length: 0.05,
            reference_area: 0.002,
            atmosphere: crate::physics::atmosphere::isa(0.0),
        };
        assert!(!set.force_calc(&conditions, &mut forces));

        let mut changed = conditions;
        set.push(Box::new(Injector));
        assert!(set.flight_conditions(&mut changed));
        assert_eq!(changed.velocity, conditions.velocity * 2.0);
    }
}
