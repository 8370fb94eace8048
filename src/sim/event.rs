use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use crate::vehicle::{MotorId, RecoveryId};

// ---------------------------------------------------------------------------
// Flight events
// ---------------------------------------------------------------------------

/// Kinds of flight events. Declaration order is the tie-break priority for
/// events scheduled at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Launch,
    Liftoff,
    LaunchRodCleared,
    Ignition,
    Burnout,
    EjectionCharge,
    StageSeparation,
    RecoveryDeviceDeployment,
    Apogee,
    GroundHit,
    Altitude,
    SimulationEnd,
}

impl EventKind {
    pub fn is_terminal(self) -> bool {
        self == EventKind::SimulationEnd
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Launch => "LAUNCH",
            EventKind::Liftoff => "LIFTOFF",
            EventKind::LaunchRodCleared => "LAUNCH_ROD_CLEARED",
            EventKind::Ignition => "IGNITION",
            EventKind::Burnout => "BURNOUT",
            EventKind::EjectionCharge => "EJECTION_CHARGE",
            EventKind::StageSeparation => "STAGE_SEPARATION",
            EventKind::RecoveryDeviceDeployment => "RECOVERY_DEVICE_DEPLOYMENT",
            EventKind::Apogee => "APOGEE",
            EventKind::GroundHit => "GROUND_HIT",
            EventKind::Altitude => "ALTITUDE",
            EventKind::SimulationEnd => "SIMULATION_END",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rocket component an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRef {
    Motor(MotorId),
    Stage(usize),
    Recovery(RecoveryId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventPayload {
    /// Altitude before and after one step, m above the launch site.
    Altitude { old: f64, new: f64 },
}

/// An immutable flight event.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightEvent {
    pub kind: EventKind,
    pub time: f64,
    pub source: Option<ComponentRef>,
    pub payload: Option<EventPayload>,
}

impl FlightEvent {
    pub fn new(kind: EventKind, time: f64) -> Self {
        Self { kind, time, source: None, payload: None }
    }

    pub fn with_source(mut self, source: ComponentRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn altitude(time: f64, old: f64, new: f64) -> Self {
        Self {
            kind: EventKind::Altitude,
            time,
            source: None,
            payload: Some(EventPayload::Altitude { old, new }),
        }
    }
}

impl fmt::Display for FlightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:.3}", self.kind, self.time)?;
        if let Some(src) = self.source {
            write!(f, " ({src:?})")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Queued {
    event: FlightEvent,
    seq: u64,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest time, then kind, then insertion)
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.event.kind.cmp(&self.event.kind))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of flight events keyed by (time, kind priority, insertion order).
#[derive(Default, Clone)]
pub struct EventQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FlightEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { event, seq });
    }

    pub fn peek(&self) -> Option<&FlightEvent> {
        self.heap.peek().map(|q| &q.event)
    }

    pub fn pop(&mut self) -> Option<FlightEvent> {
        self.heap.pop().map(|q| q.event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue").field("len", &self.heap.len()).finish()
    }
}

// ---------------------------------------------------------------------------
// Apogee detection
// ---------------------------------------------------------------------------

/// Altitude drop below the running maximum that counts as apogee, m.
pub const APOGEE_HYSTERESIS: f64 = 0.01;

/// Tracks the running altitude maximum and reports when altitude has
/// fallen below it by more than [`APOGEE_HYSTERESIS`].
#[derive(Debug, Clone, Copy)]
pub struct ApogeeDetector {
    max_altitude: f64,
    max_time: f64,
}

impl Default for ApogeeDetector {
    fn default() -> Self {
        Self { max_altitude: f64::NEG_INFINITY, max_time: 0.0 }
    }
}

impl ApogeeDetector {
    /// Feed one sample. Returns true once the altitude is past the peak.
    pub fn update(&mut self, time: f64, altitude: f64) -> bool {
        if altitude > self.max_altitude {
            self.max_altitude = altitude;
            self.max_time = time;
        }
        altitude < self.max_altitude - APOGEE_HYSTERESIS
    }

    pub fn max_altitude(&self) -> f64 {
        self.max_altitude.max(0.0)
    }

    /// Time the running maximum was observed.
    pub fn max_time(&self) -> f64 {
        self.max_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn pops_in_time_then_kind_order() {
        let mut q = EventQueue::new();
        q.push(FlightEvent::new(EventKind::SimulationEnd, 5.0));
        q.push(FlightEvent::altitude(1.0, 0.0, 1.0));
        q.push(FlightEvent::new(EventKind::Ignition, 1.0));
        q.push(FlightEvent::new(EventKind::Launch, 0.0));
        q.push(FlightEvent::new(EventKind::GroundHit, 5.0));
        q.push(FlightEvent::new(EventKind::Burnout, 2.5));

        let order: Vec<(EventKind, f64)> =
            std::iter::from_fn(|| q.pop()).map(|e| (e.kind, e.time)).collect();
        assert_eq!(
            order,
            vec![
                (EventKind::Launch, 0.0),
                (EventKind::Ignition, 1.0),
                (EventKind::Altitude, 1.0),
                (EventKind::Burnout, 2.5),
                (EventKind::GroundHit, 5.0),
                (EventKind::SimulationEnd, 5.0),
            ]
        );
    }

    #[test]
    fn pseudo_random_insertions_pop_sorted() {
        let kinds = [
            EventKind::Apogee,
            EventKind::Ignition,
            EventKind::Altitude,
            EventKind::Launch,
            EventKind::StageSeparation,
            EventKind::SimulationEnd,
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let mut q = EventQueue::new();
        for _ in 0..200 {
            let t = rng.gen_range(0..10) as f64 * 0.5;
            let k = kinds[rng.gen_range(0..kinds.len())];
            q.push(FlightEvent::new(k, t));
        }
        let popped: Vec<FlightEvent> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(popped.len(), 200);
        for w in popped.windows(2) {
            let a = (w[0].time, w[0].kind);
            let b = (w[1].time, w[1].kind);
            assert!(a.0 < b.0 || (a.0 == b.0 && a.1 <= b.1), "{a:?} before {b:?}");
        }
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut q = EventQueue::new();
        q.push(FlightEvent::new(EventKind::Ignition, 1.0).with_source(ComponentRef::Motor(MotorId(3))));
        q.push(FlightEvent::new(EventKind::Ignition, 1.0).with_source(ComponentRef::Motor(MotorId(1))));
        assert_eq!(q.pop().and_then(|e| e.source), Some(ComponentRef::Motor(MotorId(3))));
        assert_eq!(q.peek().and_then(|e| e.source), Some(ComponentRef::Motor(MotorId(1))));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn apogee_found_at_synthetic_peak() {
        // h(t) = 100 - (t - 4)^2 sampled every 0.05 s
        let mut det = ApogeeDetector::default();
        let dt = 0.05;
        let mut fired_at = None;
        for i in 0..200 {
            let t = i as f64 * dt;
            let h = 100.0 - (t - 4.0).powi(2);
            if det.update(t, h) {
                fired_at = Some(t);
                break;
            }
        }
        let t = fired_at.expect("apogee never detected");
        assert!(t > 4.0 && t - 4.0 <= 3.0 * dt, "fired at {t}");
        assert!((det.max_time() - 4.0).abs() <= dt);
        assert!((det.max_altitude() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn flat_noise_is_not_apogee() {
        let mut det = ApogeeDetector::default();
        assert!(!det.update(0.0, 50.0));
        assert!(!det.update(0.1, 49.995));
        assert!(det.update(0.2, 49.98));
    }
}
