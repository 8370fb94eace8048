use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// A reasonably accurate nominal time step, s.
pub const RECOMMENDED_TIME_STEP: f64 = 0.05;

/// A reasonable per-step pitch/yaw rotation limit, rad.
pub const RECOMMENDED_ANGLE_STEP: f64 = 3.0 * std::f64::consts::PI / 180.0;

/// Run options. Every field is optional when deserializing:
/// `{ "time_step": 0.02, "launch_rod_length": 1.5 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    pub time_step: f64,            // nominal RK4 step, s
    pub max_step_angle: f64,       // rad
    pub launch_rod_length: f64,    // m
    pub launch_rod_angle: f64,     // rad from vertical
    pub launch_rod_direction: f64, // rad, azimuth from north (+Y) toward east (+X)
    pub launch_latitude: f64,      // rad
    pub launch_altitude: f64,      // m above sea level
    pub wind_average: f64,         // m/s
    pub wind_turbulence: f64,      // m/s, standard deviation of gusts
    pub wind_direction: f64,       // rad, azimuth the wind blows toward
    pub random_seed: u64,
    pub recovery_time_step: f64,   // upper bound for descent steps, s
    pub max_time: f64,             // sanity bound on simulated time, s
    pub calculate_extras: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            time_step: RECOMMENDED_TIME_STEP,
            max_step_angle: RECOMMENDED_ANGLE_STEP,
            launch_rod_length: 1.0,
            launch_rod_angle: 0.0,
            launch_rod_direction: 0.0,
            launch_latitude: 28.61_f64.to_radians(),
            launch_altitude: 0.0,
            wind_average: 0.0,
            wind_turbulence: 0.0,
            wind_direction: 0.0,
            random_seed: 0,
            recovery_time_step: 0.5,
            max_time: 1200.0,
            calculate_extras: true,
        }
    }
}

impl SimOptions {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        let positive = [
            ("time_step", self.time_step),
            ("max_step_angle", self.max_step_angle),
            ("recovery_time_step", self.recovery_time_step),
            ("max_time", self.max_time),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if !(self.launch_rod_length >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "launch_rod_length must be non-negative, got {}",
                self.launch_rod_length
            )));
        }
        if !(0.0..std::f64::consts::FRAC_PI_2).contains(&self.launch_rod_angle.abs()) {
            return Err(SimError::InvalidConfig(format!(
                "launch_rod_angle must be within ±90°, got {:.1}°",
                self.launch_rod_angle.to_degrees()
            )));
        }
        if self.wind_turbulence < 0.0 {
            return Err(SimError::InvalidConfig("wind_turbulence must be non-negative".into()));
        }
        Ok(())
    }

    /// Unit vector along the launch rod (ENU frame).
    pub fn launch_rod_vector(&self) -> nalgebra::Vector3<f64> {
        let (sa, ca) = self.launch_rod_angle.sin_cos();
        let (sd, cd) = self.launch_rod_direction.sin_cos();
        nalgebra::Vector3::new(sa * sd, sa * cd, ca)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimOptions::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let opts: SimOptions =
            serde_json::from_str(r#"{ "time_step": 0.01, "launch_rod_length": 2.5 }"#).unwrap();
        assert_eq!(opts.time_step, 0.01);
        assert_eq!(opts.launch_rod_length, 2.5);
        assert_eq!(opts.recovery_time_step, 0.5);
    }

    #[test]
    fn zero_time_step_rejected() {
        let opts = SimOptions { time_step: 0.0, ..Default::default() };
        assert!(matches!(opts.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn rod_vector_points_along_azimuth() {
        let opts = SimOptions {
            launch_rod_angle: 10f64.to_radians(),
            launch_rod_direction: 90f64.to_radians(),
            ..Default::default()
        };
        let v = opts.launch_rod_vector();
        assert!((v.norm() - 1.0).abs() < 1e-12);
        assert!(v.x > 0.0 && v.y.abs() < 1e-12 && v.z > 0.9);
    }
}
