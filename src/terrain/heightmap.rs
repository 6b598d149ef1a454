// 高度图生成

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::curve::HeightCurve;
use super::error::Result;
use super::falloff::Falloff;
use super::grid::{Grid, HeightGrid, Resolution};
use super::noise::{FractalNoise, NoiseConfig};

/// Snapshot of everything the height synthesizer consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParameters {
    pub noise: NoiseConfig,
    pub falloff: Falloff,
    /// Final vertical scale applied after the curve
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
}

impl Default for SynthesisParameters {
    fn default() -> Self {
        Self {
            noise: NoiseConfig::default(),
            falloff: Falloff::default(),
            height_multiplier: 10.0,
            height_curve: HeightCurve::linear(),
        }
    }
}

/// Synthesize the height grid for `resolution`.
///
/// Same parameters and resolution always give a bit-identical grid.
pub fn synthesize_heights(
    resolution: Resolution,
    params: &SynthesisParameters,
) -> Result<HeightGrid> {
    let field = normalized_field(resolution, params)?;
    let multiplier = params.height_multiplier;
    let curve = &params.height_curve;

    let heights = field.par_map(|&value| curve.evaluate(value as f32) * multiplier);
    Ok(HeightGrid::new(heights, multiplier))
}

/// Noise normalized to `[0, 1]` with the falloff mask applied, before the
/// height curve and multiplier.
///
/// Two passes over an intermediate buffer: the whole octave sum has to exist
/// before the min/max used for normalization is known.
pub fn normalized_field(resolution: Resolution, params: &SynthesisParameters) -> Result<Grid<f64>> {
    let resolution = resolution.validate()?;
    let noise = FractalNoise::new(&params.noise)?;
    let (width, height) = (resolution.x, resolution.y);

    let mut buffer = vec![0.0f64; resolution.cell_count()];
    buffer
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let v = y as f64 / height as f64;
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = noise.sample(x as f64 / width as f64, v);
            }
        });

    let (min, max) = buffer
        .par_iter()
        .fold(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &value| (lo.min(value), hi.max(value)),
        )
        .reduce(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |a, b| (a.0.min(b.0), a.1.max(b.1)),
        );

    let range = max - min;
    if range > 0.0 {
        let falloff = &params.falloff;
        buffer
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    let normalized = ((*cell - min) / range).clamp(0.0, 1.0);
                    let distance = Falloff::distance(x, y, width, height);
                    *cell = falloff.apply(normalized, distance);
                }
            });
    } else {
        log::warn!(
            "Noise field over {}x{} is uniform, normalizing to zero",
            width,
            height
        );
        buffer.fill(0.0);
    }

    Grid::from_vec(resolution, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::curve::CurveKey;
    use crate::terrain::error::TerrainError;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn params_with_seed(seed: u32) -> SynthesisParameters {
        SynthesisParameters {
            noise: NoiseConfig {
                seed,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_height_count_matches_resolution() {
        let grid = synthesize_heights(Resolution::new(40, 25), &SynthesisParameters::default())
            .unwrap();
        assert_eq!(grid.cells().len(), 1000);
        assert_eq!(grid.resolution(), Resolution::new(40, 25));
        assert_eq!(grid.multiplier(), 10.0);
    }

    #[test]
    fn test_same_parameters_produce_identical_heights() {
        let params = params_with_seed(12345);
        let a = synthesize_heights(Resolution::new(64, 48), &params).unwrap();
        let b = synthesize_heights(Resolution::new(64, 48), &params).unwrap();

        let bits_a: Vec<u32> = a.cells().as_slice().iter().map(|h| h.to_bits()).collect();
        let bits_b: Vec<u32> = b.cells().as_slice().iter().map(|h| h.to_bits()).collect();
        assert_eq!(bits_a, bits_b, "Same parameters should produce identical heights");
    }

    #[test]
    fn test_different_seeds_produce_different_heights() {
        let a = synthesize_heights(Resolution::new(50, 50), &params_with_seed(123)).unwrap();
        let b = synthesize_heights(Resolution::new(50, 50), &params_with_seed(456)).unwrap();

        let differences = a
            .cells()
            .as_slice()
            .iter()
            .zip(b.cells().as_slice())
            .filter(|(h1, h2)| (*h1 - *h2).abs() > 1e-4)
            .count();
        assert!(
            differences > a.cells().len() / 2,
            "Only {} of {} heights differ",
            differences,
            a.cells().len()
        );
    }

    #[test]
    fn test_zero_octaves_is_invalid() {
        let mut params = SynthesisParameters::default();
        params.noise.octaves = 0;
        assert!(matches!(
            synthesize_heights(Resolution::new(8, 8), &params),
            Err(TerrainError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_resolution_is_invalid() {
        assert!(matches!(
            synthesize_heights(Resolution::new(0, 8), &SynthesisParameters::default()),
            Err(TerrainError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_uniform_field_normalizes_to_zero() {
        // A single sample has min == max
        let field = normalized_field(Resolution::new(1, 1), &SynthesisParameters::default())
            .unwrap();
        assert_eq!(*field.get(0, 0), 0.0);
    }

    #[test]
    fn test_normalized_field_spans_unit_range_without_falloff() {
        let params = SynthesisParameters {
            falloff: Falloff::none(),
            ..params_with_seed(3)
        };
        let field = normalized_field(Resolution::new(32, 32), &params).unwrap();
        let min = field.as_slice().iter().copied().fold(f64::INFINITY, f64::min);
        let max = field.as_slice().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_normalized_field_stays_in_unit_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..20 {
            let params = SynthesisParameters {
                noise: NoiseConfig {
                    seed: rng.random(),
                    scale: rng.random_range(-0.5..2.0),
                    octaves: rng.random_range(1..7),
                    persistence: rng.random_range(0.05..1.0),
                    lacunarity: rng.random_range(1.1..3.5),
                    offset: [rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0)],
                },
                falloff: Falloff {
                    strength: rng.random_range(0.0..3.0),
                    ramp: rng.random_range(0.0..8.0),
                    range: rng.random_range(-1.0..5.0),
                },
                ..Default::default()
            };
            let field = normalized_field(Resolution::new(24, 17), &params).unwrap();
            for (x, y, &value) in field.iter() {
                assert!(
                    (0.0..=1.0).contains(&value),
                    "Value {} at ({}, {}) outside [0, 1] for {:?}",
                    value,
                    x,
                    y,
                    params
                );
            }
        }
    }

    #[test]
    fn test_falloff_lowers_the_border() {
        let params = params_with_seed(11);
        let grid = synthesize_heights(Resolution::new(33, 33), &params).unwrap();

        // Default falloff fully suppresses the outermost ring
        for i in 0..33 {
            assert_eq!(grid.get(i, 0), 0.0);
            assert_eq!(grid.get(0, i), 0.0);
            assert_eq!(grid.get(i, 32), 0.0);
            assert_eq!(grid.get(32, i), 0.0);
        }
    }

    #[test]
    fn test_curve_and_multiplier_are_applied() {
        let flat_curve = HeightCurve::new(vec![CurveKey::new(0.0, 0.5), CurveKey::new(1.0, 0.5)]);
        let params = SynthesisParameters {
            height_multiplier: 4.0,
            height_curve: flat_curve,
            ..params_with_seed(5)
        };
        let grid = synthesize_heights(Resolution::new(10, 10), &params).unwrap();
        assert!(grid.cells().as_slice().iter().all(|&h| h == 2.0));
    }
}
