use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Wind velocity (ENU, direction the air moves toward) at a given time.
pub trait WindModel: Send {
    fn wind_velocity(&mut self, time: f64, altitude: f64) -> Vector3<f64>;
}

/// Steady horizontal wind.
#[derive(Debug, Clone, Copy)]
pub struct ConstantWind {
    pub velocity: Vector3<f64>,
}

impl ConstantWind {
    pub fn calm() -> Self {
        Self { velocity: Vector3::zeros() }
    }

    /// `direction` is the azimuth (from north, toward east) the wind blows toward.
    pub fn new(speed: f64, direction: f64) -> Self {
        Self { velocity: horizontal(speed, direction) }
    }
}

impl WindModel for ConstantWind {
    fn wind_velocity(&mut self, _time: f64, _altitude: f64) -> Vector3<f64> {
        self.velocity
    }
}

// ---------------------------------------------------------------------------
// Gusting wind
// ---------------------------------------------------------------------------

const GUST_SAMPLE_INTERVAL: f64 = 0.1; // s
const GUST_CORRELATION_TIME: f64 = 2.0; // s

/// Gusting wind speed as an Ornstein-Uhlenbeck process around `average`.
///
/// Samples live on a fixed time grid and are generated strictly in grid
/// order, so the value at a given time depends only on the seed. RK4 sub-step
/// evaluations may query out of order without perturbing the sequence.
#[derive(Debug, Clone)]
pub struct TurbulentWind {
    average: f64,
    std_dev: f64,
    direction: f64,
    rng: ChaCha8Rng,
    samples: Vec<f64>,
}

impl TurbulentWind {
    pub fn new(average: f64, std_dev: f64, direction: f64, seed: u64) -> Self {
        Self {
            average,
            std_dev,
            direction,
            rng: ChaCha8Rng::seed_from_u64(seed),
            samples: vec![average],
        }
    }

    fn extend_to(&mut self, index: usize) {
        let theta = 1.0 / GUST_CORRELATION_TIME;
        let dt = GUST_SAMPLE_INTERVAL;
        let diffusion = self.std_dev * (2.0 * theta * dt).sqrt();
        while self.samples.len() <= index {
            let prev = *self.samples.last().unwrap_or(&self.average);
            let next = prev + theta * (self.average - prev) * dt + diffusion * standard_normal(&mut self.rng);
            self.samples.push(next);
        }
    }

    /// Wind speed at `time`, linearly interpolated between grid samples.
    pub fn speed(&mut self, time: f64) -> f64 {
        let t = time.max(0.0) / GUST_SAMPLE_INTERVAL;
        let i = t.floor() as usize;
        self.extend_to(i + 1);
        let frac = t - i as f64;
        self.samples[i] * (1.0 - frac) + self.samples[i + 1] * frac
    }
}

impl WindModel for TurbulentWind {
    fn wind_velocity(&mut self, time: f64, _altitude: f64) -> Vector3<f64> {
        let speed = self.speed(time);
        horizontal(speed, self.direction)
    }
}

fn horizontal(speed: f64, direction: f64) -> Vector3<f64> {
    let (s, c) = direction.sin_cos();
    Vector3::new(speed * s, speed * c, 0.0)
}

/// Box-Muller transform.
pub(crate) fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_wind_direction() {
        let mut w = ConstantWind::new(5.0, std::f64::consts::FRAC_PI_2);
        let v = w.wind_velocity(3.0, 100.0);
        assert!((v.x - 5.0).abs() < 1e-12);
        assert!(v.y.abs() < 1e-12);
    }

    #[test]
    fn turbulence_is_order_independent() {
        let mut a = TurbulentWind::new(4.0, 1.0, 0.0, 7);
        let mut b = TurbulentWind::new(4.0, 1.0, 0.0, 7);
        let late = a.speed(12.34);
        let _ = a.speed(0.5);
        let early = b.speed(0.5);
        assert_eq!(b.speed(12.34).to_bits(), late.to_bits());
        assert_eq!(a.speed(0.5).to_bits(), early.to_bits());
    }

    #[test]
    fn turbulence_averages_out() {
        let mut w = TurbulentWind::new(5.0, 1.0, 0.0, 42);
        let n = 5000;
        let mean: f64 = (0..n).map(|i| w.speed(i as f64 * 0.1)).sum::<f64>() / n as f64;
        assert!((mean - 5.0).abs() < 0.5, "mean {mean}");
    }

    #[test]
    fn zero_deviation_is_steady() {
        let mut w = TurbulentWind::new(3.0, 0.0, 0.0, 1);
        assert!((w.speed(50.0) - 3.0).abs() < 1e-12);
    }
}
