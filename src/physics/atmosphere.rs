use crate::physics::gravity::G0;

// ---------------------------------------------------------------------------
// ISA 1976 Standard Atmosphere (sea level to 86 km)
// ---------------------------------------------------------------------------

const R_AIR: f64 = 287.052_87; // specific gas constant for dry air, J/(kg·K)
const GAMMA: f64 = 1.4;        // ratio of specific heats

const T0: f64 = 288.15;        // sea-level temperature, K
const P0: f64 = 101_325.0;     // sea-level pressure, Pa

// Sutherland's law for dynamic viscosity of air
const SUTHERLAND_MU_REF: f64 = 1.458e-6; // kg/(m·s·K^0.5)
const SUTHERLAND_S: f64 = 110.4;         // K

/// Atmospheric properties at a given geometric altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphericConditions {
    pub density: f64,             // kg/m^3
    pub pressure: f64,            // Pa
    pub temperature: f64,         // K
    pub speed_of_sound: f64,      // m/s
    pub kinematic_viscosity: f64, // m^2/s
}

/// Pure query: altitude above sea level → atmospheric state.
pub trait AtmosphericModel: Send {
    fn conditions(&self, altitude: f64) -> AtmosphericConditions;
}

/// ISA 1976 standard atmosphere, optionally offset in temperature.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsaAtmosphere {
    pub temperature_offset: f64, // K, added to every layer
}

impl AtmosphericModel for IsaAtmosphere {
    fn conditions(&self, altitude: f64) -> AtmosphericConditions {
        let mut c = isa(altitude);
        if self.temperature_offset != 0.0 {
            let t = c.temperature + self.temperature_offset;
            c = from_pressure_temperature(c.pressure, t);
        }
        c
    }
}

/// ISA 1976 standard atmosphere model.
///
/// Piecewise temperature profile with 7 layers from 0-86 km.
/// Clamps negative altitudes to sea level; returns near-vacuum above 86 km.
pub fn isa(altitude_m: f64) -> AtmosphericConditions {
    let h = altitude_m.max(0.0);

    let (temperature, pressure) = if h < 11_000.0 {
        // Troposphere: lapse -6.5 K/km
        gradient_layer(h, 0.0, T0, -0.0065, P0)
    } else if h < 20_000.0 {
        // Tropopause: isothermal 216.65 K
        isothermal_layer(h, 11_000.0, 216.65, 22_632.1)
    } else if h < 32_000.0 {
        gradient_layer(h, 20_000.0, 216.65, 0.001, 5_474.89)
    } else if h < 47_000.0 {
        gradient_layer(h, 32_000.0, 228.65, 0.0028, 868.019)
    } else if h < 51_000.0 {
        isothermal_layer(h, 47_000.0, 270.65, 110.906)
    } else if h < 71_000.0 {
        gradient_layer(h, 51_000.0, 270.65, -0.0028, 66.9389)
    } else if h < 86_000.0 {
        gradient_layer(h, 71_000.0, 214.65, -0.002, 3.956_42)
    } else {
        // Above 86 km: exponential decay approximation
        let t = 186.87;
        let p = 0.3734 * (-0.000_15 * (h - 86_000.0)).exp();
        (t, p.max(0.0))
    };

    from_pressure_temperature(pressure, temperature)
}

fn from_pressure_temperature(pressure: f64, temperature: f64) -> AtmosphericConditions {
    let density = if temperature > 0.0 {
        pressure / (R_AIR * temperature)
    } else {
        0.0
    };

    let mu = SUTHERLAND_MU_REF * temperature.powf(1.5) / (temperature + SUTHERLAND_S);
    let kinematic_viscosity = if density > 1e-12 { mu / density } else { f64::INFINITY };

    AtmosphericConditions {
        density,
        pressure,
        temperature,
        speed_of_sound: (GAMMA * R_AIR * temperature.max(0.0)).sqrt(),
        kinematic_viscosity,
    }
}

// ---------------------------------------------------------------------------
// Layer helpers
// ---------------------------------------------------------------------------

/// Gradient layer: T = T_base + lapse * (h - h_base)
fn gradient_layer(h: f64, h_base: f64, t_base: f64, lapse: f64, p_base: f64) -> (f64, f64) {
    let t = t_base + lapse * (h - h_base);
    let p = p_base * (t / t_base).powf(-G0 / (lapse * R_AIR));
    (t, p)
}

/// Isothermal layer: T = const, pressure decays exponentially
fn isothermal_layer(h: f64, h_base: f64, t: f64, p_base: f64) -> (f64, f64) {
    let p = p_base * ((-G0 / (R_AIR * t)) * (h - h_base)).exp();
    (t, p)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
