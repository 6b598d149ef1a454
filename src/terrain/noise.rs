use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::{Result, TerrainError};

/// Smallest usable noise scale; anything at or below is clamped to this.
pub const MIN_SCALE: f64 = 1e-4;

/// Per-octave sampling offsets are drawn from `[-RANGE, RANGE)`.
const OCTAVE_OFFSET_RANGE: f64 = 100_000.0;

/// Configuration for seeded fractal noise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Random seed for reproducible generation
    pub seed: u32,

    /// Spatial divisor of the sampling frequency (larger = broader features).
    /// Sampling positions are normalized to the grid, so typical values are
    /// 0.1 - 1.0
    pub scale: f64,

    /// Number of noise layers to combine (must be at least 1)
    pub octaves: usize,

    /// Amplitude decay per octave, in (0, 1]
    pub persistence: f64,

    /// Frequency multiplier between octaves, > 1
    pub lacunarity: f64,

    /// Sampling origin shift, in normalized grid units
    pub offset: [f64; 2],
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 0.3,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: [0.0, 0.0],
        }
    }
}

impl NoiseConfig {
    pub fn new(seed: u32, scale: f64, octaves: usize, persistence: f64, lacunarity: f64) -> Self {
        Self {
            seed,
            scale,
            octaves,
            persistence,
            lacunarity,
            offset: [0.0, 0.0],
        }
    }

    /// Scale with degenerate values replaced by [`MIN_SCALE`].
    pub fn effective_scale(&self) -> f64 {
        // NaN fails the comparison and is clamped too
        if self.scale > MIN_SCALE {
            self.scale
        } else {
            MIN_SCALE
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Octave {
    offset: [f64; 2],
    frequency: f64,
    amplitude: f64,
}

/// Fractional Brownian motion over Perlin noise with seeded per-octave offsets.
///
/// Frequencies and amplitudes are accumulated by repeated multiplication, so
/// a given config yields the same samples on every platform.
pub struct FractalNoise {
    perlin: Perlin,
    octaves: Vec<Octave>,
    offset: [f64; 2],
}

impl FractalNoise {
    pub fn new(config: &NoiseConfig) -> Result<Self> {
        if config.octaves == 0 {
            return Err(TerrainError::InvalidParameter(
                "octaves must be at least 1".to_string(),
            ));
        }

        let scale = config.effective_scale();
        if scale != config.scale {
            log::warn!(
                "Noise scale {} is degenerate, using {} instead",
                config.scale,
                scale
            );
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed as u64);
        let mut frequency = 1.0 / scale;
        let mut amplitude = 1.0;
        let octaves = (0..config.octaves)
            .map(|_| {
                let octave = Octave {
                    offset: [
                        rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE),
                        rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE),
                    ],
                    frequency,
                    amplitude,
                };
                frequency *= config.lacunarity;
                amplitude *= config.persistence;
                octave
            })
            .collect();

        Ok(Self {
            perlin: Perlin::new(config.seed),
            octaves,
            offset: config.offset,
        })
    }

    pub fn octave_count(&self) -> usize {
        self.octaves.len()
    }

    /// Unnormalized octave sum at normalized grid position `(u, v)`.
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        self.octaves
            .iter()
            .map(|octave| {
                let nx = (u + self.offset[0] + octave.offset[0]) * octave.frequency;
                let ny = (v + self.offset[1] + octave.offset[1]) * octave.frequency;
                self.perlin.get([nx, ny]) * octave.amplitude
            })
            .sum()
    }
}
