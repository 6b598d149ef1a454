use serde::{Deserialize, Serialize};

use super::grid::{normalize_height, ColorGrid, HeightGrid};

/// RGBA color, each component in range [0.0, 1.0]
pub type Color = [f32; 4];

/// Color used for every cell when no biome is configured.
pub const NEUTRAL_COLOR: Color = [0.5, 0.5, 0.5, 1.0];

/// How far past a band edge to probe for the neighbouring band.
const EDGE_PROBE: f32 = 1e-4;

/// How the renderer should sample the color grid. The synthesizer only tags
/// the grid with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Nearest-neighbour sampling (hard pixel edges)
    Point,
    #[default]
    Bilinear,
}

/// Which band wins when several contain the same height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapRule {
    /// Later entries take priority
    #[default]
    LastMatch,
    FirstMatch,
}

/// A height band painted with one color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    pub color: Color,
    /// Normalized band start in [0.0, 1.0]
    pub start_height: f32,
    /// Normalized band end in [0.0, 1.0], >= start
    pub end_height: f32,
}

impl Default for Biome {
    fn default() -> Self {
        Self::new(0.0, 1.0, [1.0, 1.0, 1.0, 1.0])
    }
}

impl Biome {
    pub fn new(start_height: f32, end_height: f32, color: Color) -> Self {
        Self {
            color,
            start_height,
            end_height,
        }
    }

    /// Band edges in ascending order, even if they were entered inverted.
    pub fn bounds(&self) -> (f32, f32) {
        if self.start_height <= self.end_height {
            (self.start_height, self.end_height)
        } else {
            (self.end_height, self.start_height)
        }
    }

    pub fn contains(&self, height: f32) -> bool {
        let (lo, hi) = self.bounds();
        height >= lo && height <= hi
    }

    /// Distance from `height` to the nearest edge of the band; zero inside.
    pub fn edge_distance(&self, height: f32) -> f32 {
        let (lo, hi) = self.bounds();
        if height < lo {
            lo - height
        } else if height > hi {
            height - hi
        } else {
            0.0
        }
    }

    /// Move the start edge, dragging the end edge along if they would cross.
    pub fn set_start_height(&mut self, value: f32) {
        self.start_height = value.clamp(0.0, 1.0);
        if self.end_height < self.start_height {
            self.end_height = self.start_height;
        }
    }

    /// Move the end edge, dragging the start edge along if they would cross.
    pub fn set_end_height(&mut self, value: f32) {
        self.end_height = value.clamp(0.0, 1.0);
        if self.start_height > self.end_height {
            self.start_height = self.end_height;
        }
    }
}

/// Earth-like bands from deep water to snow
pub fn default_biomes() -> Vec<Biome> {
    vec![
        // Deep water
        Biome::new(0.0, 0.3, [0.05, 0.15, 0.45, 1.0]),
        // Shallow water
        Biome::new(0.3, 0.4, [0.15, 0.4, 0.75, 1.0]),
        // Sand
        Biome::new(0.4, 0.45, [0.8, 0.78, 0.5, 1.0]),
        // Grass
        Biome::new(0.45, 0.7, [0.25, 0.6, 0.2, 1.0]),
        // Rock
        Biome::new(0.7, 0.9, [0.45, 0.38, 0.3, 1.0]),
        // Snow
        Biome::new(0.9, 1.0, [0.95, 0.95, 0.95, 1.0]),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParameters {
    /// Blend amount toward the neighbouring band near an edge, in [0.0, 1.0].
    /// Zero gives hard bands.
    pub interpolation: f32,
    pub filter_mode: FilterMode,
    pub overlap: OverlapRule,
}

impl Default for ColorParameters {
    fn default() -> Self {
        Self {
            interpolation: 0.0,
            filter_mode: FilterMode::Bilinear,
            overlap: OverlapRule::LastMatch,
        }
    }
}

/// Index of the band owning `height`.
///
/// Bands containing the height are chosen by `overlap`. In a gap the band
/// with the nearest edge wins, ties going to the earliest band.
pub fn resolve_biome(biomes: &[Biome], height: f32, overlap: OverlapRule) -> Option<usize> {
    let mut matching = biomes
        .iter()
        .enumerate()
        .filter(|(_, biome)| biome.contains(height))
        .map(|(idx, _)| idx);
    let found = match overlap {
        OverlapRule::LastMatch => matching.last(),
        OverlapRule::FirstMatch => matching.next(),
    };
    if found.is_some() {
        return found;
    }

    let mut nearest: Option<(usize, f32)> = None;
    for (idx, biome) in biomes.iter().enumerate() {
        let distance = biome.edge_distance(height);
        match nearest {
            Some((_, best)) if distance >= best => {}
            _ => nearest = Some((idx, distance)),
        }
    }
    nearest.map(|(idx, _)| idx)
}

/// Color for a normalized height.
pub fn biome_color(biomes: &[Biome], height: f32, params: &ColorParameters) -> Color {
    match resolve_biome(biomes, height, params.overlap) {
        Some(idx) => blend_with_neighbour(biomes, idx, height, params),
        None => NEUTRAL_COLOR,
    }
}

/// Near a band edge, mix in the band on the other side of it. The weight
/// rises from 0 at `interpolation * span / 2` away from the edge to
/// `interpolation / 2` on the edge. At full interpolation colors are
/// continuous across a shared boundary.
fn blend_with_neighbour(biomes: &[Biome], idx: usize, height: f32, params: &ColorParameters) -> Color {
    let biome = &biomes[idx];
    let interpolation = params.interpolation.clamp(0.0, 1.0);
    if interpolation <= 0.0 {
        return biome.color;
    }

    let (lo, hi) = biome.bounds();
    let width = interpolation * (hi - lo) * 0.5;
    if width <= 0.0 {
        return biome.color;
    }

    let (distance, across) = if hi - height <= height - lo {
        (hi - height, hi + EDGE_PROBE)
    } else {
        (height - lo, lo - EDGE_PROBE)
    };
    let distance = distance.max(0.0);
    if distance >= width || !(0.0..=1.0).contains(&across) {
        return biome.color;
    }

    match resolve_biome(biomes, across, params.overlap) {
        Some(neighbour) if neighbour != idx => {
            let weight = 0.5 * interpolation * (1.0 - distance / width);
            lerp_color(biome.color, biomes[neighbour].color, weight)
        }
        _ => biome.color,
    }
}

/// Synthesize the color grid from the current heights.
///
/// Heights are rescaled to [0, 1] by the grid's multiplier before banding.
/// An empty biome list yields a uniform [`NEUTRAL_COLOR`] grid.
pub fn synthesize_colors(heights: &HeightGrid, biomes: &[Biome], params: &ColorParameters) -> ColorGrid {
    let resolution = heights.resolution();
    if biomes.is_empty() {
        return ColorGrid::uniform(resolution, NEUTRAL_COLOR, params.filter_mode);
    }

    for (idx, biome) in biomes.iter().enumerate() {
        if biome.start_height > biome.end_height {
            log::warn!(
                "Biome {} has inverted band {}..{}, treating it as {}..{}",
                idx,
                biome.start_height,
                biome.end_height,
                biome.end_height,
                biome.start_height
            );
        }
    }

    let multiplier = heights.multiplier();
    let cells = heights.cells().par_map(|&h| {
        let normalized = normalize_height(h, multiplier);
        biome_color(biomes, normalized, params)
    });
    ColorGrid::new(cells, params.filter_mode)
}

pub fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
        lerp(a[3], b[3], t),
    ]
}

/// Quantize to 8-bit RGBA
pub fn to_rgba8(color: Color) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Linear interpolation between two values, exact at both ends
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}
