use serde::{Deserialize, Serialize};

const MIN_SHAPE: f64 = 1e-3;

/// Edge attenuation mask producing island-like, bounded terrain.
///
/// The mask grows from 0 at the grid center to 1 at the border along the
/// Chebyshev distance `d = max(|u|, |v|)`, with `u, v` in `[-1, 1]`:
///
/// ```text
/// mask(d) = d^ramp / (d^ramp + (range - range * d)^ramp)
/// ```
///
/// `ramp` controls how sharp the transition is, `range` moves it toward the
/// edge (larger range keeps more of the interior untouched). The noise is then
/// scaled by `1 - strength * mask`, clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Falloff {
    pub strength: f64,
    pub ramp: f64,
    pub range: f64,
}

impl Default for Falloff {
    fn default() -> Self {
        Self {
            strength: 1.0,
            ramp: 3.0,
            range: 2.2,
        }
    }
}

impl Falloff {
    /// A mask that leaves the noise untouched.
    pub fn none() -> Self {
        Self {
            strength: 0.0,
            ..Default::default()
        }
    }

    /// Normalized distance of cell `(x, y)` from the grid center.
    pub fn distance(x: usize, y: usize, width: usize, height: usize) -> f64 {
        let axis = |i: usize, n: usize| {
            if n <= 1 {
                0.0
            } else {
                (i as f64 / (n - 1) as f64 * 2.0 - 1.0).abs()
            }
        };
        axis(x, width).max(axis(y, height))
    }

    /// Mask value in `[0, 1]` for a distance in `[0, 1]`.
    pub fn mask(&self, distance: f64) -> f64 {
        let d = distance.clamp(0.0, 1.0);
        let ramp = self.ramp.max(MIN_SHAPE);
        let range = self.range.max(MIN_SHAPE);

        // libm keeps the result identical on every target
        let inner = libm::pow(d, ramp);
        let outer = libm::pow(range - range * d, ramp);
        let total = inner + outer;
        if total <= 0.0 {
            return 0.0;
        }
        (inner / total).clamp(0.0, 1.0)
    }

    /// Attenuate a normalized noise value at `distance`.
    pub fn apply(&self, value: f64, distance: f64) -> f64 {
        let strength = self.strength.max(0.0);
        let attenuation = (1.0 - strength * self.mask(distance)).clamp(0.0, 1.0);
        (value * attenuation).clamp(0.0, 1.0)
    }
}
