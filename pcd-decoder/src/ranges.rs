/// Per-axis min/max tracking for decoded clouds
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranges {
    pub x: Range,
    pub y: Range,
    pub z: Range,
    pub intensity: Range,
}

/// Running bounds, initialised to infinity until the first sample arrives
#[derive(Debug, Clone)]
pub(crate) struct RangeTracker {
    min: [f32; 4],
    max: [f32; 4],
    positions_seen: bool,
    intensity_seen: bool,
}

impl RangeTracker {
    pub fn new() -> Self {
        Self {
            min: [f32::INFINITY; 4],
            max: [f32::NEG_INFINITY; 4],
            positions_seen: false,
            intensity_seen: false,
        }
    }

    pub fn update_position(&mut self, x: f32, y: f32, z: f32) {
        for (axis, v) in [x, y, z].into_iter().enumerate() {
            self.min[axis] = self.min[axis].min(v);
            self.max[axis] = self.max[axis].max(v);
        }
        self.positions_seen = true;
    }

    pub fn update_intensity(&mut self, v: f32) {
        self.min[3] = self.min[3].min(v);
        self.max[3] = self.max[3].max(v);
        self.intensity_seen = true;
    }

    /// Collapse into final ranges; axes that never saw a sample become `{0, 0}`.
    pub fn finish(self) -> Ranges {
        let pick = |axis: usize, seen: bool| {
            if seen {
                Range {
                    min: self.min[axis],
                    max: self.max[axis],
                }
            } else {
                Range::default()
            }
        };
        Ranges {
            x: pick(0, self.positions_seen),
            y: pick(1, self.positions_seen),
            z: pick(2, self.positions_seen),
            intensity: pick(3, self.intensity_seen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_axes_collapse_to_zero() {
        let mut tracker = RangeTracker::new();
        tracker.update_position(1.0, -2.0, 3.0);
        tracker.update_position(-1.0, 2.0, 3.0);
        let ranges = tracker.finish();
        assert_eq!(ranges.x, Range { min: -1.0, max: 1.0 });
        assert_eq!(ranges.y.span(), 4.0);
        assert_eq!(ranges.z, Range { min: 3.0, max: 3.0 });
        assert_eq!(ranges.intensity, Range::default());
    }
}
