pub const G0: f64 = 9.80665; // standard gravity, m/s^2
pub const EARTH_RADIUS: f64 = 6_371_000.0; // mean Earth radius, m

/// Pure query: local gravitational acceleration magnitude.
pub trait GravityModel: Send {
    /// `latitude` in radians, `altitude` in metres above sea level.
    fn gravity(&self, latitude: f64, altitude: f64) -> f64;
}

/// WGS-84 normal gravity at the surface, with inverse-square falloff aloft.
#[derive(Debug, Clone, Copy, Default)]
pub struct WgsGravity;

impl GravityModel for WgsGravity {
    fn gravity(&self, latitude: f64, altitude: f64) -> f64 {
        let sin2 = latitude.sin().powi(2);
        let g_surface = 9.780_326_771_4 * (1.0 + 0.001_931_851_386_39 * sin2)
            / (1.0 - 0.006_694_379_990_13 * sin2).sqrt();
        let alt = altitude.max(0.0);
        g_surface * (EARTH_RADIUS / (EARTH_RADIUS + alt)).powi(2)
    }
}

/// Constant gravity, handy for analytic checks.
#[derive(Debug, Clone, Copy)]
pub struct ConstantGravity(pub f64);

impl GravityModel for ConstantGravity {
    fn gravity(&self, _latitude: f64, _altitude: f64) -> f64 {
        self.0
    }
}
