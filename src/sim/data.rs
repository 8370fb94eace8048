use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::event::{EventKind, FlightEvent};
use super::warning::WarningSet;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitGroup {
    None,
    Time,
    Length,
    Velocity,
    Acceleration,
    Mass,
    Inertia,
    Angle,
    AngularVelocity,
    Force,
    Area,
    Temperature,
    Pressure,
}

impl UnitGroup {
    /// SI symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            UnitGroup::None => "",
            UnitGroup::Time => "s",
            UnitGroup::Length => "m",
            UnitGroup::Velocity => "m/s",
            UnitGroup::Acceleration => "m/s²",
            UnitGroup::Mass => "kg",
            UnitGroup::Inertia => "kg·m²",
            UnitGroup::Angle => "rad",
            UnitGroup::AngularVelocity => "rad/s",
            UnitGroup::Force => "N",
            UnitGroup::Area => "m²",
            UnitGroup::Temperature => "K",
            UnitGroup::Pressure => "Pa",
        }
    }
}

// ---------------------------------------------------------------------------
// Data types and registry
// ---------------------------------------------------------------------------

/// Handle to a registered series. Only meaningful with the registry that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlightDataType(usize);

impl FlightDataType {
    pub const TIME: Self = Self(0);
    pub const ALTITUDE: Self = Self(1);
    pub const VELOCITY_Z: Self = Self(2);
    pub const ACCELERATION_Z: Self = Self(3);
    pub const VELOCITY_TOTAL: Self = Self(4);
    pub const ACCELERATION_TOTAL: Self = Self(5);
    pub const POSITION_X: Self = Self(6);
    pub const POSITION_Y: Self = Self(7);
    pub const POSITION_XY: Self = Self(8);
    pub const VELOCITY_XY: Self = Self(9);
    pub const ACCELERATION_XY: Self = Self(10);
    pub const AOA: Self = Self(11);
    pub const ROLL_RATE: Self = Self(12);
    pub const PITCH_RATE: Self = Self(13);
    pub const YAW_RATE: Self = Self(14);
    pub const MASS: Self = Self(15);
    pub const LONGITUDINAL_INERTIA: Self = Self(16);
    pub const ROTATIONAL_INERTIA: Self = Self(17);
    pub const CP_LOCATION: Self = Self(18);
    pub const CG_LOCATION: Self = Self(19);
    pub const STABILITY: Self = Self(20);
    pub const MACH_NUMBER: Self = Self(21);
    pub const REYNOLDS_NUMBER: Self = Self(22);
    pub const THRUST_FORCE: Self = Self(23);
    pub const DRAG_FORCE: Self = Self(24);
    pub const DRAG_COEFF: Self = Self(25);
    pub const AXIAL_DRAG_COEFF: Self = Self(26);
    pub const NORMAL_FORCE_COEFF: Self = Self(27);
    pub const PITCH_MOMENT_COEFF: Self = Self(28);
    pub const YAW_MOMENT_COEFF: Self = Self(29);
    pub const SIDE_FORCE_COEFF: Self = Self(30);
    pub const ROLL_MOMENT_COEFF: Self = Self(31);
    pub const ROLL_FORCING_COEFF: Self = Self(32);
    pub const ROLL_DAMPING_COEFF: Self = Self(33);
    pub const REFERENCE_LENGTH: Self = Self(34);
    pub const REFERENCE_AREA: Self = Self(35);
    pub const ORIENTATION_VERTICAL: Self = Self(36);
    pub const ORIENTATION_AZIMUTH: Self = Self(37);
    pub const WIND_VELOCITY: Self = Self(38);
    pub const AIR_TEMPERATURE: Self = Self(39);
    pub const AIR_PRESSURE: Self = Self(40);
    pub const SPEED_OF_SOUND: Self = Self(41);
    pub const GRAVITY: Self = Self(42);
    pub const TIME_STEP: Self = Self(43);
    pub const COMPUTATION_TIME: Self = Self(44);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Standard series in index order: (name, unit).
const STANDARD_TYPES: &[(&str, UnitGroup)] = &[
    ("Time", UnitGroup::Time),
    ("Altitude", UnitGroup::Length),
    ("Vertical velocity", UnitGroup::Velocity),
    ("Vertical acceleration", UnitGroup::Acceleration),
    ("Total velocity", UnitGroup::Velocity),
    ("Total acceleration", UnitGroup::Acceleration),
    ("Position East of launch", UnitGroup::Length),
    ("Position North of launch", UnitGroup::Length),
    ("Lateral distance", UnitGroup::Length),
    ("Lateral velocity", UnitGroup::Velocity),
    ("Lateral acceleration", UnitGroup::Acceleration),
    ("Angle of attack", UnitGroup::Angle),
    ("Roll rate", UnitGroup::AngularVelocity),
    ("Pitch rate", UnitGroup::AngularVelocity),
    ("Yaw rate", UnitGroup::AngularVelocity),
    ("Mass", UnitGroup::Mass),
    ("Longitudinal moment of inertia", UnitGroup::Inertia),
    ("Rotational moment of inertia", UnitGroup::Inertia),
    ("CP location", UnitGroup::Length),
    ("CG location", UnitGroup::Length),
    ("Stability margin calibers", UnitGroup::None),
    ("Mach number", UnitGroup::None),
    ("Reynolds number", UnitGroup::None),
    ("Thrust", UnitGroup::Force),
    ("Drag force", UnitGroup::Force),
    ("Drag coefficient", UnitGroup::None),
    ("Axial drag coefficient", UnitGroup::None),
    ("Normal force coefficient", UnitGroup::None),
    ("Pitch moment coefficient", UnitGroup::None),
    ("Yaw moment coefficient", UnitGroup::None),
    ("Side force coefficient", UnitGroup::None),
    ("Roll moment coefficient", UnitGroup::None),
    ("Roll forcing coefficient", UnitGroup::None),
    ("Roll damping coefficient", UnitGroup::None),
    ("Reference length", UnitGroup::Length),
    ("Reference area", UnitGroup::Area),
    ("Vertical orientation (zenith)", UnitGroup::Angle),
    ("Lateral orientation (azimuth)", UnitGroup::Angle),
    ("Wind velocity", UnitGroup::Velocity),
    ("Air temperature", UnitGroup::Temperature),
    ("Air pressure", UnitGroup::Pressure),
    ("Speed of sound", UnitGroup::Velocity),
    ("Gravitational acceleration", UnitGroup::Acceleration),
    ("Simulation time step", UnitGroup::Time),
    ("Computation time", UnitGroup::Time),
];

#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeInfo {
    pub name: String,
    pub unit: UnitGroup,
    pub priority: usize, // display order; lower first
}

/// Series metadata. Built once, then shared read-only between recorders.
#[derive(Debug, Clone)]
pub struct DataTypeRegistry {
    types: Vec<DataTypeInfo>,
}

impl Default for DataTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTypeRegistry {
    /// Registry holding the standard series.
    pub fn new() -> Self {
        let types = STANDARD_TYPES
            .iter()
            .enumerate()
            .map(|(i, (name, unit))| DataTypeInfo { name: (*name).to_string(), unit: *unit, priority: i })
            .collect();
        Self { types }
    }

    /// Look up a series by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<FlightDataType> {
        self.types
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
            .map(FlightDataType)
    }

    /// Register a custom series, or return the existing one with that name.
    pub fn register(&mut self, name: &str, unit: UnitGroup) -> FlightDataType {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        let priority = self.types.len();
        self.types.push(DataTypeInfo { name: name.to_string(), unit, priority });
        FlightDataType(priority)
    }

    pub fn info(&self, ty: FlightDataType) -> Option<&DataTypeInfo> {
        self.types.get(ty.0)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Series {
    values: Vec<f64>,
    min: f64,
    max: f64,
}

impl Series {
    fn with_len(len: usize) -> Self {
        Self { values: vec![f64::NAN; len], min: f64::NAN, max: f64::NAN }
    }

    fn track(&mut self, v: f64) {
        if v.is_nan() {
            return;
        }
        if self.min.is_nan() || v < self.min {
            self.min = v;
        }
        if self.max.is_nan() || v > self.max {
            self.max = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Recorder (mutable, one per run)
// ---------------------------------------------------------------------------

/// Append-only recorder for one branch.
#[derive(Debug, Clone)]
pub struct BranchRecorder {
    name: String,
    registry: Arc<DataTypeRegistry>,
    series: BTreeMap<FlightDataType, Series>,
    len: usize,
    events: Vec<FlightEvent>,
}

impl BranchRecorder {
    pub fn new(name: impl Into<String>, registry: Arc<DataTypeRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            series: BTreeMap::new(),
            len: 0,
            events: Vec::new(),
        }
    }

    /// Start a new row; every series gets a NaN until set.
    pub fn add_point(&mut self) {
        self.len += 1;
        for s in self.series.values_mut() {
            s.values.push(f64::NAN);
        }
    }

    /// Set `ty` in the current row. Ignored before the first `add_point`.
    pub fn set_value(&mut self, ty: FlightDataType, value: f64) {
        if self.len == 0 {
            return;
        }
        let len = self.len;
        let series = self.series.entry(ty).or_insert_with(|| Series::with_len(len));
        if let Some(last) = series.values.last_mut() {
            *last = value;
        }
        series.track(value);
    }

    pub fn add_event(&mut self, event: FlightEvent) {
        self.events.push(event);
    }

    pub fn registry(&self) -> &Arc<DataTypeRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Latest value of `ty`, NaN when absent.
    pub fn last(&self, ty: FlightDataType) -> f64 {
        self.series
            .get(&ty)
            .and_then(|s| s.values.last().copied())
            .unwrap_or(f64::NAN)
    }

    pub fn events(&self) -> &[FlightEvent] {
        &self.events
    }

    pub fn finish(self) -> FlightDataBranch {
        FlightDataBranch {
            name: self.name,
            registry: self.registry,
            series: self.series,
            len: self.len,
            events: self.events,
        }
    }
}

// ---------------------------------------------------------------------------
// Branch (immutable)
// ---------------------------------------------------------------------------

/// Finished, read-only time log of one branch.
#[derive(Debug, Clone)]
pub struct FlightDataBranch {
    name: String,
    registry: Arc<DataTypeRegistry>,
    series: BTreeMap<FlightDataType, Series>,
    len: usize,
    events: Vec<FlightEvent>,
}

impl FlightDataBranch {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &DataTypeRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, ty: FlightDataType) -> Option<&[f64]> {
        self.series.get(&ty).map(|s| s.values.as_slice())
    }

    /// Running minimum (NaN values ignored); NaN when never set.
    pub fn min(&self, ty: FlightDataType) -> f64 {
        self.series.get(&ty).map_or(f64::NAN, |s| s.min)
    }

    pub fn max(&self, ty: FlightDataType) -> f64 {
        self.series.get(&ty).map_or(f64::NAN, |s| s.max)
    }

    pub fn last(&self, ty: FlightDataType) -> f64 {
        self.get(ty).and_then(|v| v.last().copied()).unwrap_or(f64::NAN)
    }

    /// Series types present, in registry priority order.
    pub fn types(&self) -> Vec<FlightDataType> {
        let mut types: Vec<FlightDataType> = self.series.keys().copied().collect();
        types.sort_by_key(|t| self.registry.info(*t).map_or(usize::MAX, |i| i.priority));
        types
    }

    pub fn events(&self) -> &[FlightEvent] {
        &self.events
    }

    pub fn first_event(&self, kind: EventKind) -> Option<&FlightEvent> {
        self.events.iter().find(|e| e.kind == kind)
    }

    /// Value of `ty` at `time`, interpolated between recorded rows.
    pub fn value_at(&self, ty: FlightDataType, time: f64) -> f64 {
        let (times, values) = match (self.get(FlightDataType::TIME), self.get(ty)) {
            (Some(t), Some(v)) => (t, v),
            _ => return f64::NAN,
        };
        let i = times.partition_point(|t| *t < time);
        if i == 0 {
            return values.first().copied().unwrap_or(f64::NAN);
        }
        if i >= times.len() {
            return values.last().copied().unwrap_or(f64::NAN);
        }
        let (t0, t1) = (times[i - 1], times[i]);
        let (v0, v1) = (values[i - 1], values[i]);
        if t1 > t0 {
            v0 + (v1 - v0) * (time - t0) / (t1 - t0)
        } else {
            v1
        }
    }
}

// ---------------------------------------------------------------------------
// Result bundle
// ---------------------------------------------------------------------------

/// Summary statistics of the main branch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlightSummary {
    pub max_altitude: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub max_mach: f64,
    pub time_to_apogee: Option<f64>,
    pub flight_time: f64,
    pub ground_hit_velocity: Option<f64>,
    pub launch_rod_velocity: Option<f64>,
    pub deployment_velocity: Option<f64>,
}

impl FlightSummary {
    pub fn from_branch(branch: &FlightDataBranch) -> Self {
        let velocity_at = |kind: EventKind| {
            branch
                .first_event(kind)
                .map(|e| branch.value_at(FlightDataType::VELOCITY_TOTAL, e.time))
        };
        FlightSummary {
            max_altitude: branch.max(FlightDataType::ALTITUDE),
            max_velocity: branch.max(FlightDataType::VELOCITY_TOTAL),
            max_acceleration: branch.max(FlightDataType::ACCELERATION_TOTAL),
            max_mach: branch.max(FlightDataType::MACH_NUMBER),
            time_to_apogee: branch.first_event(EventKind::Apogee).map(|e| e.time),
            flight_time: branch.last(FlightDataType::TIME),
            ground_hit_velocity: branch
                .first_event(EventKind::GroundHit)
                .map(|_| branch.last(FlightDataType::VELOCITY_TOTAL)),
            launch_rod_velocity: velocity_at(EventKind::LaunchRodCleared),
            deployment_velocity: velocity_at(EventKind::RecoveryDeviceDeployment),
        }
    }
}

/// Result of one simulation run.
#[derive(Debug, Clone)]
pub struct FlightData {
    pub branches: Vec<FlightDataBranch>,
    pub warnings: WarningSet,
    pub summary: FlightSummary,
}

impl FlightData {
    pub fn new(branches: Vec<FlightDataBranch>, warnings: WarningSet) -> Self {
        let summary = branches.first().map(FlightSummary::from_branch).unwrap_or_default();
        Self { branches, warnings, summary }
    }

    /// The sustainer's branch.
    pub fn main_branch(&self) -> Option<&FlightDataBranch> {
        self.branches.first()
    }
}

impl fmt::Display for FlightSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        writeln!(f, "  Max altitude:     {:>9.1} m", self.max_altitude)?;
        writeln!(f, "  Max velocity:     {:>9.1} m/s (Mach {:.2})", self.max_velocity, self.max_mach)?;
        writeln!(f, "  Max acceleration: {:>9.1} m/s^2", self.max_acceleration)?;
        writeln!(f, "  Time to apogee:   {:>9} s", opt(self.time_to_apogee))?;
        writeln!(f, "  Flight time:      {:>9.2} s", self.flight_time)?;
        writeln!(f, "  Rod clearance:    {:>9} m/s", opt(self.launch_rod_velocity))?;
        writeln!(f, "  Deployment:       {:>9} m/s", opt(self.deployment_velocity))?;
        write!(f, "  Ground hit:       {:>9} m/s", opt(self.ground_hit_velocity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<DataTypeRegistry> {
        Arc::new(DataTypeRegistry::new())
    }

    #[test]
    fn standard_indices_match_table() {
        let reg = DataTypeRegistry::new();
        assert_eq!(reg.find("time"), Some(FlightDataType::TIME));
        assert_eq!(reg.find("ALTITUDE"), Some(FlightDataType::ALTITUDE));
        assert_eq!(reg.find("Computation time"), Some(FlightDataType::COMPUTATION_TIME));
        assert_eq!(reg.find("Stability margin calibers"), Some(FlightDataType::STABILITY));
        assert_eq!(reg.len(), FlightDataType::COMPUTATION_TIME.index() + 1);
    }

    #[test]
    fn custom_registration_is_case_insensitive() {
        let mut reg = DataTypeRegistry::new();
        let a = reg.register("Fin flutter margin", UnitGroup::Velocity);
        let b = reg.register("fin FLUTTER margin", UnitGroup::None);
        assert_eq!(a, b);
        assert_eq!(reg.info(a).map(|i| i.unit), Some(UnitGroup::Velocity));
    }

    #[test]
    fn late_series_are_nan_filled() {
        let mut rec = BranchRecorder::new("Main", registry());
        rec.add_point();
        rec.set_value(FlightDataType::TIME, 0.0);
        rec.add_point();
        rec.set_value(FlightDataType::TIME, 0.1);
        rec.set_value(FlightDataType::ALTITUDE, 3.0);
        let b = rec.finish();
        let alt = b.get(FlightDataType::ALTITUDE).unwrap();
        assert_eq!(alt.len(), 2);
        assert!(alt[0].is_nan());
        assert_eq!(alt[1], 3.0);
    }

    #[test]
    fn min_max_tracked_ignoring_nan() {
        let mut rec = BranchRecorder::new("Main", registry());
        for v in [5.0, -2.0, f64::NAN, 9.0, 1.0] {
            rec.add_point();
            rec.set_value(FlightDataType::ALTITUDE, v);
        }
        let b = rec.finish();
        assert_eq!(b.min(FlightDataType::ALTITUDE), -2.0);
        assert_eq!(b.max(FlightDataType::ALTITUDE), 9.0);
        assert_eq!(b.last(FlightDataType::ALTITUDE), 1.0);
        assert!(b.max(FlightDataType::MASS).is_nan());
    }

    #[test]
    fn value_at_interpolates() {
        let mut rec = BranchRecorder::new("Main", registry());
        for (t, v) in [(0.0, 0.0), (1.0, 10.0), (2.0, 30.0)] {
            rec.add_point();
            rec.set_value(FlightDataType::TIME, t);
            rec.set_value(FlightDataType::VELOCITY_TOTAL, v);
        }
        let b = rec.finish();
        assert!((b.value_at(FlightDataType::VELOCITY_TOTAL, 1.5) - 20.0).abs() < 1e-12);
        assert_eq!(b.value_at(FlightDataType::VELOCITY_TOTAL, 5.0), 30.0);
    }

    #[test]
    fn set_before_first_point_is_ignored() {
        let mut rec = BranchRecorder::new("Main", registry());
        rec.set_value(FlightDataType::TIME, 1.0);
        assert!(rec.is_empty());
        assert!(rec.finish().get(FlightDataType::TIME).is_none());
    }

    #[test]
    fn types_in_priority_order() {
        let mut rec = BranchRecorder::new("Main", registry());
        rec.add_point();
        rec.set_value(FlightDataType::MASS, 1.0);
        rec.set_value(FlightDataType::TIME, 0.0);
        let b = rec.finish();
        assert_eq!(b.types(), vec![FlightDataType::TIME, FlightDataType::MASS]);
    }
}
