// ---------------------------------------------------------------------------
// Stage definition (one stage of a multi-stage rocket)
// ---------------------------------------------------------------------------

/// One stage of a stacked rocket. Axial positions are measured from the
/// stage's own forward end toward its tail.
///
/// Aerodynamic coefficients are contributions referenced to the rocket's
/// reference area (largest active body diameter), so the coefficients of
/// the active stages simply add up.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub length: f64,               // m
    pub diameter: f64,             // m, body tube
    pub structure_mass: f64,       // kg, everything except motors
    pub cg: f64,                   // m from stage top
    pub longitudinal_inertia: f64, // kg·m^2 about own CG, pitch/yaw axis
    pub rotational_inertia: f64,   // kg·m^2 about body axis
    pub cd: f64,                   // zero-AoA drag contribution
    pub cn_alpha: f64,             // normal force slope, 1/rad
    pub cp: f64,                   // m from stage top
    pub pitch_damping: f64,        // dimensionless, scales rate·length/V
    pub roll_damping: f64,         // dimensionless, scales rate·length/V
    pub roll_forcing: f64,         // roll moment coefficient from fin cant
}

impl Stage {
    pub fn reference_area(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.diameter / 4.0
    }
}

// ---------------------------------------------------------------------------
// Stage builder
// ---------------------------------------------------------------------------

pub struct StageBuilder {
    stage: Stage,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stage: Stage {
                name: name.into(),
                length: 1.0,
                diameter: 0.05,
                structure_mass: 0.5,
                cg: 0.5,
                longitudinal_inertia: 0.04,
                rotational_inertia: 0.0002,
                cd: 0.45,
                cn_alpha: 8.0,
                cp: 0.75,
                pitch_damping: 6.0,
                roll_damping: 0.5,
                roll_forcing: 0.0,
            },
        }
    }

    pub fn length(mut self, v: f64) -> Self { self.stage.length = v; self }
    pub fn diameter(mut self, v: f64) -> Self { self.stage.diameter = v; self }
    pub fn structure_mass(mut self, v: f64) -> Self { self.stage.structure_mass = v; self }
    pub fn cg(mut self, v: f64) -> Self { self.stage.cg = v; self }
    pub fn longitudinal_inertia(mut self, v: f64) -> Self { self.stage.longitudinal_inertia = v; self }
    pub fn rotational_inertia(mut self, v: f64) -> Self { self.stage.rotational_inertia = v; self }
    pub fn cd(mut self, v: f64) -> Self { self.stage.cd = v; self }
    pub fn cn_alpha(mut self, v: f64) -> Self { self.stage.cn_alpha = v; self }
    pub fn cp(mut self, v: f64) -> Self { self.stage.cp = v; self }
    pub fn pitch_damping(mut self, v: f64) -> Self { self.stage.pitch_damping = v; self }
    pub fn roll_damping(mut self, v: f64) -> Self { self.stage.roll_damping = v; self }
    pub fn roll_forcing(mut self, v: f64) -> Self { self.stage.roll_forcing = v; self }

    pub fn build(self) -> Stage {
        self.stage
    }
}
