//! Effective scaling bounds.

use serde::{Deserialize, Serialize};

use enactor_core::NodeType;

/// Corrected min/max for a node type. Always `1 <= min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingLimits {
    pub min: u32,
    pub max: u32,
}

impl ScalingLimits {
    pub fn new(configured_min: u32, configured_max: u32) -> Self {
        let min = configured_min.max(1);
        Self {
            min,
            max: configured_max.max(min),
        }
    }

    /// Force `count` into `[min, max]`.
    pub fn clamp(&self, count: u32) -> u32 {
        count.min(self.max).max(self.min)
    }
}

impl From<&NodeType> for ScalingLimits {
    fn from(node_type: &NodeType) -> Self {
        Self::new(node_type.scaling.min, node_type.scaling.max)
    }
}

/// Effective `(min, max)` for a node type, whatever its configuration.
pub fn get_scaling_limits(node_type: &NodeType) -> ScalingLimits {
    ScalingLimits::from(node_type)
}

/// Clamp `count` to the bounds of `node_type`.
pub fn clamp(count: u32, node_type: &NodeType) -> u32 {
    get_scaling_limits(node_type).clamp(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_correct_misconfiguration() {
        assert_eq!(ScalingLimits::new(0, 0), ScalingLimits { min: 1, max: 1 });
        assert_eq!(ScalingLimits::new(3, 1), ScalingLimits { min: 3, max: 3 });
        assert_eq!(ScalingLimits::new(2, 5), ScalingLimits { min: 2, max: 5 });
    }

    #[test]
    fn limits_from_node_type() {
        let node = NodeType::new("app", 0, 4);
        assert_eq!(get_scaling_limits(&node), ScalingLimits { min: 1, max: 4 });
    }

    #[test]
    fn clamp_into_range() {
        let node = NodeType::new("app", 2, 4);
        assert_eq!(clamp(0, &node), 2);
        assert_eq!(clamp(3, &node), 3);
        assert_eq!(clamp(9, &node), 4);
    }

    #[test]
    fn clamp_is_idempotent() {
        for (min, max) in [(0, 0), (1, 1), (2, 5), (5, 2), (3, 10)] {
            let limits = ScalingLimits::new(min, max);
            for x in 0..20 {
                let once = limits.clamp(x);
                assert_eq!(limits.clamp(once), once);
                assert!(limits.min <= once && once <= limits.max);
            }
        }
    }

    #[test]
    fn clamp_is_monotonic_in_bounds() {
        for x in 0..20 {
            for min in 0..6 {
                for max in 0..8 {
                    let base = ScalingLimits::new(min, max).clamp(x);
                    assert!(ScalingLimits::new(min + 1, max).clamp(x) >= base);
                    assert!(ScalingLimits::new(min, max + 1).clamp(x) >= base);
                }
            }
        }
    }
}
