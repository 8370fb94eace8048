use std::fmt;
use std::mem;

/// Non-fatal condition noticed during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Recovery device deployed while a motor was still burning.
    RecoveryDeploymentWhileBurning,
    /// Recovery device deployed while still on the launch guide.
    RecoveryLaunchGuide,
    /// Recovery device deployed at high speed (m/s).
    RecoveryHighSpeed(f64),
    /// A listener changed flight conditions, forces or the event stream.
    ListenersAffected,
    /// The run reached its configured time limit.
    TimeLimitReached,
    /// Angle of attack (rad) outside the range of the aerodynamic model.
    LargeAngleOfAttack(f64),
    Other(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::RecoveryDeploymentWhileBurning => {
                f.write_str("Recovery device deployed while motor still burning")
            }
            Warning::RecoveryLaunchGuide => f.write_str("Recovery device deployed while on the launch guide"),
            Warning::RecoveryHighSpeed(v) => write!(f, "Recovery device deployment at high speed ({v:.0} m/s)"),
            Warning::ListenersAffected => f.write_str("Listeners modified the flight simulation"),
            Warning::TimeLimitReached => f.write_str("Simulation time limit reached"),
            Warning::LargeAngleOfAttack(a) => {
                write!(f, "Large angle of attack encountered ({:.1}°)", a.to_degrees())
            }
            Warning::Other(msg) => f.write_str(msg),
        }
    }
}

/// Warnings keyed by kind: adding a kind already present replaces it, so a
/// repeated condition is reported once with its latest value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarningSet {
    warnings: Vec<Warning>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the set did not already hold this kind of warning.
    pub fn add(&mut self, warning: Warning) -> bool {
        let key = |w: &Warning| match w {
            Warning::Other(msg) => (mem::discriminant(w), Some(msg.clone())),
            _ => (mem::discriminant(w), None),
        };
        let k = key(&warning);
        match self.warnings.iter_mut().find(|w| key(&**w) == k) {
            Some(existing) => {
                *existing = warning;
                false
            }
            None => {
                self.warnings.push(warning);
                true
            }
        }
    }

    pub fn extend(&mut self, other: WarningSet) {
        for w in other.warnings {
            self.add(w);
        }
    }

    pub fn contains(&self, pred: impl Fn(&Warning) -> bool) -> bool {
        self.warnings.iter().any(pred)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_replaces() {
        let mut set = WarningSet::new();
        assert!(set.add(Warning::RecoveryHighSpeed(25.0)));
        assert!(!set.add(Warning::RecoveryHighSpeed(40.0)));
        assert_eq!(set.len(), 1);
        assert!(set.contains(|w| *w == Warning::RecoveryHighSpeed(40.0)));
    }

    #[test]
    fn distinct_messages_are_kept() {
        let mut set = WarningSet::new();
        set.add(Warning::Other("a".into()));
        set.add(Warning::Other("b".into()));
        set.add(Warning::ListenersAffected);
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().last().map(|w| w.to_string()).as_deref(), Some("Listeners modified the flight simulation"));
    }
}
