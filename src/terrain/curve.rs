use serde::{Deserialize, Serialize};

/// A control point of a [`HeightCurve`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Input value in [0.0, 1.0]
    pub time: f32,
    /// Output value in [0.0, 1.0]
    pub value: f32,
}

impl CurveKey {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear remapping from normalized noise to normalized height.
///
/// Monotonic by convention; evaluation clamps to the first and last key
/// outside their range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurveKey>", into = "Vec<CurveKey>")]
pub struct HeightCurve {
    keys: Vec<CurveKey>,
}

impl From<Vec<CurveKey>> for HeightCurve {
    fn from(keys: Vec<CurveKey>) -> Self {
        Self::new(keys)
    }
}

impl From<HeightCurve> for Vec<CurveKey> {
    fn from(curve: HeightCurve) -> Self {
        curve.keys
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl HeightCurve {
    /// Create a curve from control points; keys are sorted by time.
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Identity mapping
    pub fn linear() -> Self {
        Self::new(vec![CurveKey::new(0.0, 0.0), CurveKey::new(1.0, 1.0)])
    }

    /// Flattens everything below 0.4 into a shallow sea floor
    pub fn island() -> Self {
        Self::new(vec![
            CurveKey::new(0.0, 0.0),
            CurveKey::new(0.4, 0.05),
            CurveKey::new(0.6, 0.3),
            CurveKey::new(1.0, 1.0),
        ])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            // An empty curve passes values through
            _ => return t,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        for window in self.keys.windows(2) {
            let (lower, upper) = (window[0], window[1]);
            if t >= lower.time && t <= upper.time {
                let range = upper.time - lower.time;
                if range <= 0.0 {
                    return upper.value;
                }
                let local_t = (t - lower.time) / range;
                return lower.value + (upper.value - lower.value) * local_t;
            }
        }
        last.value
    }
}
