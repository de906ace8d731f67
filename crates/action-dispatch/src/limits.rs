use serde::{Deserialize, Serialize};

/// Axis-aligned reachable volume in the robot base frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceLimits {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl WorkspaceLimits {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: &[f64; 3]) -> bool {
        self.violation(p).is_none()
    }

    /// Describes the first axis `p` falls outside of.
    pub fn violation(&self, p: &[f64; 3]) -> Option<String> {
        const AXES: [&str; 3] = ["x", "y", "z"];
        (0..3).find_map(|i| {
            if !p[i].is_finite() || p[i] < self.min[i] || p[i] > self.max[i] {
                Some(format!(
                    "{} = {:.3} outside [{:.3}, {:.3}]",
                    AXES[i], p[i], self.min[i], self.max[i]
                ))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let l = WorkspaceLimits::new([-0.5, -0.5, 0.1], [0.5, 0.5, 1.2]);
        assert!(l.contains(&[0.0, 0.0, 0.8]));
        assert!(l.contains(&[0.5, -0.5, 1.2]));
        assert!(!l.contains(&[0.0, 0.0, 1.5]));
        assert!(!l.contains(&[f64::NAN, 0.0, 0.5]));
        assert_eq!(
            l.violation(&[0.0, 0.7, 0.5]).as_deref(),
            Some("y = 0.700 outside [-0.500, 0.500]")
        );
    }
}
