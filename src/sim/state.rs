use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Rigid-body state: position, velocity, attitude, angular rate
// ---------------------------------------------------------------------------

/// Kinematic state, world frame (ENU, launch site at origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidState {
    pub position: Vector3<f64>,           // m
    pub velocity: Vector3<f64>,           // m/s
    pub orientation: UnitQuaternion<f64>, // body→world rotation, body +Z toward the nose
    pub rotation: Vector3<f64>,           // rad/s, world-frame angular velocity
}

impl RigidState {
    pub fn at_rest(orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation,
            rotation: Vector3::zeros(),
        }
    }

    /// Advance by `d` over `dt`. Returns a fresh value; `self` is untouched.
    pub fn advanced(&self, d: &Derivative, dt: f64) -> RigidState {
        let mut orientation = UnitQuaternion::from_scaled_axis(d.rotation * dt) * self.orientation;
        orientation.renormalize();
        RigidState {
            position: self.position + d.velocity * dt,
            velocity: self.velocity + d.acceleration * dt,
            orientation,
            rotation: self.rotation + d.angular_acceleration * dt,
        }
    }

    /// Body Z-axis (nose direction) in the world frame.
    pub fn body_z(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    pub fn has_nan(&self) -> bool {
        let q = self.orientation.quaternion();
        self.position.iter().any(|v| v.is_nan())
            || self.velocity.iter().any(|v| v.is_nan())
            || self.rotation.iter().any(|v| v.is_nan())
            || q.coords.iter().any(|v| v.is_nan())
    }

    /// Squared magnitudes beyond which the run is considered diverged.
    pub fn out_of_range(&self) -> bool {
        const LIMIT: f64 = 1e18;
        self.position.norm_squared() > LIMIT
            || self.velocity.norm_squared() > LIMIT
            || self.rotation.norm_squared() > LIMIT
    }
}

// ---------------------------------------------------------------------------
// State derivative
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative {
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
    pub rotation: Vector3<f64>,             // drives the orientation update
    pub angular_acceleration: Vector3<f64>, // world frame
}

impl Derivative {
    /// Classical RK4 combination (k1 + 2k2 + 2k3 + k4) / 6.
    pub fn rk4(k1: &Derivative, k2: &Derivative, k3: &Derivative, k4: &Derivative) -> Derivative {
        Derivative {
            velocity: (k1.velocity + 2.0 * k2.velocity + 2.0 * k3.velocity + k4.velocity) / 6.0,
            acceleration: (k1.acceleration + 2.0 * k2.acceleration + 2.0 * k3.acceleration + k4.acceleration)
                / 6.0,
            rotation: (k1.rotation + 2.0 * k2.rotation + 2.0 * k3.rotation + k4.rotation) / 6.0,
            angular_acceleration: (k1.angular_acceleration
                + 2.0 * k2.angular_acceleration
                + 2.0 * k3.angular_acceleration
                + k4.angular_acceleration)
                / 6.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin(rate: f64) -> Derivative {
        Derivative {
            velocity: Vector3::new(0.0, 0.0, 10.0),
            acceleration: Vector3::new(0.0, 0.0, -9.8),
            rotation: Vector3::new(0.0, rate, 0.0),
            angular_acceleration: Vector3::zeros(),
        }
    }

    #[test]
    fn advancing_leaves_source_untouched() {
        let s = RigidState::at_rest(UnitQuaternion::identity());
        let p = s.advanced(&spin(1.0), 0.1);
        assert_eq!(s, RigidState::at_rest(UnitQuaternion::identity()));
        assert!((p.position.z - 1.0).abs() < 1e-12);
        assert!((p.velocity.z + 0.98).abs() < 1e-12);
    }

    #[test]
    fn orientation_follows_rotation() {
        let s = RigidState::at_rest(UnitQuaternion::identity());
        let p = s.advanced(&spin(std::f64::consts::FRAC_PI_2), 1.0);
        // quarter turn about +Y takes the nose from +Z to +X
        let z = p.body_z();
        assert!((z.x - 1.0).abs() < 1e-12 && z.z.abs() < 1e-12);
        assert!((p.orientation.quaternion().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rk4_weights_constant_derivative() {
        let k = spin(0.5);
        let c = Derivative::rk4(&k, &k, &k, &k);
        assert!((c.acceleration - k.acceleration).norm() < 1e-12);
        assert!((c.rotation - k.rotation).norm() < 1e-12);
    }

    #[test]
    fn nan_and_range_checks() {
        let mut s = RigidState::at_rest(UnitQuaternion::identity());
        assert!(!s.has_nan());
        s.velocity.x = f64::NAN;
        assert!(s.has_nan());
        let mut far = RigidState::at_rest(UnitQuaternion::identity());
        far.position.z = 2e9;
        assert!(far.out_of_range());
    }
}
