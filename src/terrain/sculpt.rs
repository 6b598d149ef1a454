use serde::{Deserialize, Serialize};

use super::color_map::{lerp_color, Color};
use super::grid::{Grid, GridStore, Resolution};

/// Upper bound on the elapsed time a single tick may apply (100 Hz baseline).
/// A stalled frame therefore never lands a disproportionately large edit.
pub const MAX_TICK_SECONDS: f32 = 0.01;

/// Editing mode of the brush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToolType {
    #[default]
    Raise,
    Lower,
    /// Pull heights toward the height under the brush center
    Flatten,
    /// Pull heights toward their 3x3 neighbourhood average
    Smooth,
    /// Blend the color grid toward the tool color
    Paint,
}

impl ToolType {
    pub const ALL: [ToolType; 5] = [
        ToolType::Raise,
        ToolType::Lower,
        ToolType::Flatten,
        ToolType::Smooth,
        ToolType::Paint,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ToolType::Raise => "Raise",
            ToolType::Lower => "Lower",
            ToolType::Flatten => "Flatten",
            ToolType::Smooth => "Smooth",
            ToolType::Paint => "Paint",
        }
    }
}

/// Operator-chosen brush configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolState {
    pub tool: ToolType,
    /// Brush radius in world units
    pub size: f32,
    /// Change per second at the brush center
    pub strength: f32,
    /// Only used by [`ToolType::Paint`]
    pub color: Color,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: ToolType::Raise,
            size: 5.0,
            strength: 10.0,
            color: [0.8, 0.35, 0.2, 1.0],
        }
    }
}

/// World-space cursor supplied by the host each tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cursor {
    pub position: [f32; 2],
    /// Set only while the pointer is over the terrain
    pub valid: bool,
}

impl Cursor {
    pub fn at(position: [f32; 2]) -> Self {
        Self {
            position,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Inclusive rectangle of cells touched by an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRegion {
    pub min: [usize; 2],
    pub max: [usize; 2],
}

impl DirtyRegion {
    pub fn width(&self) -> usize {
        self.max[0] - self.min[0] + 1
    }

    pub fn height(&self) -> usize {
        self.max[1] - self.min[1] + 1
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.min[0] && x <= self.max[0] && y >= self.min[1] && y <= self.max[1]
    }

    pub fn union(&self, other: &DirtyRegion) -> DirtyRegion {
        DirtyRegion {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    fn expanded(&self, margin: usize, resolution: Resolution) -> DirtyRegion {
        DirtyRegion {
            min: [
                self.min[0].saturating_sub(margin),
                self.min[1].saturating_sub(margin),
            ],
            max: [
                (self.max[0] + margin).min(resolution.x - 1),
                (self.max[1] + margin).min(resolution.y - 1),
            ],
        }
    }
}

/// Brush kernel: `1 - smoothstep(distance)` for a distance normalized to the
/// brush radius. 1 at the center, 0 at and beyond the rim. Shared by every
/// tool.
pub fn brush_weight(distance: f32) -> f32 {
    let d = distance.clamp(0.0, 1.0);
    1.0 - d * d * (3.0 - 2.0 * d)
}

/// Clamp a raw frame delta to `[0, MAX_TICK_SECONDS]`.
pub fn clamp_elapsed(elapsed: f32) -> f32 {
    if elapsed > 0.0 {
        elapsed.min(MAX_TICK_SECONDS)
    } else {
        0.0
    }
}

struct BrushCell {
    x: usize,
    y: usize,
    weight: f32,
}

/// Apply one tick of `tool` at `cursor`.
///
/// An invalid cursor, a non-positive size or elapsed time, or a brush that
/// misses the grid is a no-op and returns `None`. Otherwise returns the
/// rectangle of cells that may have changed.
pub fn apply_tool(
    store: &mut GridStore,
    tool: &ToolState,
    cursor: Cursor,
    elapsed: f32,
) -> Option<DirtyRegion> {
    if !cursor.valid || !(tool.size > 0.0) {
        return None;
    }
    let dt = clamp_elapsed(elapsed);
    if dt <= 0.0 || !tool.strength.is_finite() {
        return None;
    }

    let resolution = store.resolution();
    let center = store.world_to_grid(cursor.position);
    let scale = store.world_to_grid_scale();
    let radius = [tool.size * scale[0], tool.size * scale[1]];
    let region = footprint(center, radius, resolution)?;
    let cells = brush_cells(&region, center, radius);
    if cells.is_empty() {
        return None;
    }

    let rate = tool.strength * dt;
    let (heights, colors) = store.grids_mut();
    match tool.tool {
        ToolType::Raise | ToolType::Lower => {
            let sign = if tool.tool == ToolType::Raise { 1.0 } else { -1.0 };
            let grid = heights.cells_mut();
            for cell in &cells {
                *grid.get_mut(cell.x, cell.y) += sign * cell.weight * rate;
            }
        }
        ToolType::Flatten => {
            let grid = heights.cells_mut();
            let target = *grid.get(nearest_cell(center[0], resolution.x), nearest_cell(center[1], resolution.y));
            for cell in &cells {
                let height = grid.get_mut(cell.x, cell.y);
                *height = approach(*height, target, cell.weight * rate.abs());
            }
        }
        ToolType::Smooth => {
            let grid = heights.cells_mut();
            let snapshot = Snapshot::capture(grid, region.expanded(1, resolution));
            for cell in &cells {
                let target = snapshot.neighbourhood_average(cell.x, cell.y);
                let height = grid.get_mut(cell.x, cell.y);
                *height = approach(snapshot.get(cell.x, cell.y), target, cell.weight * rate.abs());
            }
        }
        ToolType::Paint => {
            let grid = colors.cells_mut();
            for cell in &cells {
                let color = grid.get_mut(cell.x, cell.y);
                *color = lerp_color(*color, tool.color, (cell.weight * rate).clamp(0.0, 1.0));
            }
        }
    }

    log::trace!(
        "{} at ({:.2}, {:.2}) touched {} cells",
        tool.tool.label(),
        center[0],
        center[1],
        cells.len()
    );
    Some(region)
}

/// Cell bounding box of the brush ellipse, clamped to the grid.
fn footprint(center: [f32; 2], radius: [f32; 2], resolution: Resolution) -> Option<DirtyRegion> {
    let axis = |c: f32, r: f32, n: usize| -> Option<(usize, usize)> {
        let lo = (c - r).ceil().max(0.0);
        let hi = (c + r).floor().min(n as f32 - 1.0);
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return None;
        }
        Some((lo as usize, hi as usize))
    };
    let (x0, x1) = axis(center[0], radius[0], resolution.x)?;
    let (y0, y1) = axis(center[1], radius[1], resolution.y)?;
    Some(DirtyRegion {
        min: [x0, y0],
        max: [x1, y1],
    })
}

fn brush_cells(region: &DirtyRegion, center: [f32; 2], radius: [f32; 2]) -> Vec<BrushCell> {
    let mut cells = Vec::with_capacity(region.width() * region.height());
    for y in region.min[1]..=region.max[1] {
        for x in region.min[0]..=region.max[0] {
            let dx = (x as f32 - center[0]) / radius[0];
            let dy = (y as f32 - center[1]) / radius[1];
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > 1.0 {
                continue;
            }
            let weight = brush_weight(distance);
            if weight > 0.0 {
                cells.push(BrushCell { x, y, weight });
            }
        }
    }
    cells
}

fn nearest_cell(coord: f32, n: usize) -> usize {
    coord.round().clamp(0.0, n as f32 - 1.0) as usize
}

/// Step from `current` toward `target` by at most `step`, never past it.
fn approach(current: f32, target: f32, step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= step {
        target
    } else {
        current + step.copysign(delta)
    }
}

/// Heights inside a region, copied before any cell is written so reads are
/// not biased by the scan order.
struct Snapshot {
    region: DirtyRegion,
    data: Vec<f32>,
}

impl Snapshot {
    fn capture(grid: &Grid<f32>, region: DirtyRegion) -> Self {
        let mut data = Vec::with_capacity(region.width() * region.height());
        for y in region.min[1]..=region.max[1] {
            let start = grid.index(region.min[0], y);
            data.extend_from_slice(&grid.as_slice()[start..start + region.width()]);
        }
        Self { region, data }
    }

    fn get(&self, x: usize, y: usize) -> f32 {
        let local_x = x - self.region.min[0];
        let local_y = y - self.region.min[1];
        self.data[local_y * self.region.width() + local_x]
    }

    fn neighbourhood_average(&self, x: usize, y: usize) -> f32 {
        let mut sum = 0.0;
        let mut count = 0;
        for ny in y.saturating_sub(1)..=y + 1 {
            for nx in x.saturating_sub(1)..=x + 1 {
                if self.region.contains(nx, ny) {
                    sum += self.get(nx, ny);
                    count += 1;
                }
            }
        }
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::color_map::NEUTRAL_COLOR;
    use crate::terrain::grid::{ColorGrid, HeightGrid, WorldSize};
    use crate::terrain::FilterMode;

    const N: usize = 21;

    /// One world unit per cell, flat heights at `level`.
    fn store_with(level: f32) -> GridStore {
        let resolution = Resolution::new(N, N);
        let mut store = GridStore::new(resolution, WorldSize::new(N as f32, N as f32)).unwrap();
        store
            .replace(
                HeightGrid::new(Grid::new_with(resolution, level), 10.0),
                ColorGrid::uniform(resolution, NEUTRAL_COLOR, FilterMode::Bilinear),
            )
            .unwrap();
        store
    }

    fn tool(kind: ToolType, size: f32, strength: f32) -> ToolState {
        ToolState {
            tool: kind,
            size,
            strength,
            ..Default::default()
        }
    }

    #[test]
    fn test_brush_weight_shape() {
        assert_eq!(brush_weight(0.0), 1.0);
        assert_eq!(brush_weight(1.0), 0.0);
        assert_eq!(brush_weight(2.0), 0.0);

        let mut previous = 1.0;
        for i in 1..=50 {
            let weight = brush_weight(i as f32 / 50.0);
            assert!(weight <= previous);
            previous = weight;
        }
    }

    #[test]
    fn test_invalid_cursor_is_noop() {
        let mut store = store_with(1.0);
        let heights = store.heights().clone();
        let colors = store.colors().clone();

        for kind in ToolType::ALL {
            let result = apply_tool(&mut store, &tool(kind, 5.0, 10.0), Cursor::invalid(), 0.01);
            assert_eq!(result, None);
        }
        assert_eq!(store.heights(), &heights);
        assert_eq!(store.colors(), &colors);
    }

    #[test]
    fn test_non_positive_size_or_time_is_noop() {
        let mut store = store_with(1.0);
        let heights = store.heights().clone();
        let cursor = Cursor::at([10.0, 10.0]);

        assert_eq!(apply_tool(&mut store, &tool(ToolType::Raise, 0.0, 10.0), cursor, 0.01), None);
        assert_eq!(apply_tool(&mut store, &tool(ToolType::Raise, -2.0, 10.0), cursor, 0.01), None);
        assert_eq!(apply_tool(&mut store, &tool(ToolType::Raise, 5.0, 10.0), cursor, 0.0), None);
        assert_eq!(apply_tool(&mut store, &tool(ToolType::Raise, 5.0, 10.0), cursor, -1.0), None);
        assert_eq!(store.heights(), &heights);
    }

    #[test]
    fn test_raise_and_lower_at_center() {
        let mut store = store_with(1.0);
        let cursor = Cursor::at([10.0, 10.0]);

        apply_tool(&mut store, &tool(ToolType::Raise, 5.0, 10.0), cursor, 0.005);
        assert!((store.heights().get(10, 10) - 1.05).abs() < 1e-6);

        apply_tool(&mut store, &tool(ToolType::Lower, 5.0, 10.0), cursor, 0.005);
        assert!((store.heights().get(10, 10) - 1.0).abs() < 1e-6);

        // Outside the radius nothing moved
        assert_eq!(store.heights().get(0, 0), 1.0);
        assert_eq!(store.heights().get(16, 10), 1.0);
    }

    #[test]
    fn test_doubling_elapsed_doubles_delta() {
        let cursor = Cursor::at([10.0, 10.0]);
        let raise = tool(ToolType::Raise, 4.0, 3.0);

        let mut once = store_with(0.0);
        apply_tool(&mut once, &raise, cursor, 0.004);
        let mut twice = store_with(0.0);
        apply_tool(&mut twice, &raise, cursor, 0.008);

        let single = once.heights().get(10, 10);
        let double = twice.heights().get(10, 10);
        assert!((double - 2.0 * single).abs() < 1e-6, "{} vs {}", single, double);
    }

    #[test]
    fn test_elapsed_time_is_capped() {
        let cursor = Cursor::at([10.0, 10.0]);
        let raise = tool(ToolType::Raise, 4.0, 10.0);

        let mut capped = store_with(0.0);
        apply_tool(&mut capped, &raise, cursor, MAX_TICK_SECONDS);
        let mut stalled = store_with(0.0);
        apply_tool(&mut stalled, &raise, cursor, 2.5);

        assert_eq!(capped.heights(), stalled.heights());
    }

    #[test]
    fn test_flatten_converges_without_overshoot() {
        let resolution = Resolution::new(N, N);
        let mut store = store_with(0.0);
        let heights: Vec<f32> = (0..N * N).map(|i| ((i * 37) % 11) as f32 * 0.5).collect();
        store
            .replace_heights(HeightGrid::new(Grid::from_vec(resolution, heights).unwrap(), 10.0))
            .unwrap();

        let target = store.heights().get(10, 10);
        let flatten = tool(ToolType::Flatten, 6.0, 40.0);
        let cursor = Cursor::at([10.0, 10.0]);

        let mut previous = store.heights().clone();
        for _ in 0..500 {
            apply_tool(&mut store, &flatten, cursor, 0.01);
            for (x, y, &before) in previous.cells().iter() {
                let after = store.heights().get(x, y);
                assert!(
                    (after - target).abs() <= (before - target).abs(),
                    "Cell ({}, {}) moved away from target: {} -> {}",
                    x,
                    y,
                    before,
                    after
                );
                // Never crosses the target
                assert!((before - target) * (after - target) >= 0.0);
            }
            previous = store.heights().clone();
        }
        assert_eq!(store.heights().get(10, 10), target);
        assert_eq!(store.heights().get(12, 11), target);
    }

    #[test]
    fn test_smooth_has_no_directional_bias() {
        let mut store = store_with(0.0);
        let resolution = Resolution::new(N, N);
        let mut spike = Grid::new_with(resolution, 0.0f32);
        spike.set(10, 10, 8.0);
        store.replace_heights(HeightGrid::new(spike, 10.0)).unwrap();

        apply_tool(&mut store, &tool(ToolType::Smooth, 4.0, 100.0), Cursor::at([10.0, 10.0]), 0.01);

        let h = store.heights();
        assert!(h.get(10, 10) < 8.0);
        // Neighbours read the pre-edit spike symmetrically
        assert_eq!(h.get(9, 10), h.get(11, 10));
        assert_eq!(h.get(10, 9), h.get(10, 11));
        assert_eq!(h.get(9, 9), h.get(11, 11));
        assert!(h.get(9, 10) > 0.0);
    }

    #[test]
    fn test_paint_blends_toward_tool_color() {
        let mut store = store_with(0.0);
        let red = [1.0, 0.0, 0.0, 1.0];
        let mut paint = tool(ToolType::Paint, 3.0, 10.0);
        paint.color = red;

        apply_tool(&mut store, &paint, Cursor::at([10.0, 10.0]), 0.01);
        let center = store.colors().get(10, 10);
        assert!((center[0] - 0.55).abs() < 1e-6);
        assert!((center[1] - 0.45).abs() < 1e-6);
        // Heights are untouched by paint
        assert_eq!(store.heights().get(10, 10), 0.0);

        // A huge strength saturates at a full blend
        paint.strength = 1e6;
        apply_tool(&mut store, &paint, Cursor::at([10.0, 10.0]), 0.01);
        assert_eq!(store.colors().get(10, 10), red);
    }

    #[test]
    fn test_dirty_region_is_clamped_to_grid() {
        let mut store = store_with(0.0);
        let region = apply_tool(
            &mut store,
            &tool(ToolType::Raise, 3.0, 1.0),
            Cursor::at([0.5, 20.0]),
            0.01,
        )
        .unwrap();

        assert_eq!(region.min, [0, 17]);
        assert_eq!(region.max, [3, 20]);
    }

    #[test]
    fn test_brush_off_grid_is_noop() {
        let mut store = store_with(0.0);
        let result = apply_tool(
            &mut store,
            &tool(ToolType::Raise, 2.0, 1.0),
            Cursor::at([-10.0, 5.0]),
            0.01,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_brush_respects_world_scale() {
        // Two cells per world unit: a radius of 2 world units spans 4 cells
        let resolution = Resolution::new(N, N);
        let mut store = GridStore::new(resolution, WorldSize::new(10.5, 10.5)).unwrap();
        store
            .replace(
                HeightGrid::flat(resolution, 1.0),
                ColorGrid::uniform(resolution, NEUTRAL_COLOR, FilterMode::Point),
            )
            .unwrap();

        let region = apply_tool(
            &mut store,
            &tool(ToolType::Raise, 2.0, 1.0),
            Cursor::at([5.0, 5.0]),
            0.01,
        )
        .unwrap();
        assert_eq!(region.min, [6, 6]);
        assert_eq!(region.max, [14, 14]);
        assert!(store.heights().get(13, 10) > 0.0);
        assert_eq!(store.heights().get(14, 10), 0.0);
    }

    #[test]
    fn test_approach_never_overshoots() {
        assert_eq!(approach(0.0, 1.0, 0.25), 0.25);
        assert_eq!(approach(0.0, 1.0, 5.0), 1.0);
        assert_eq!(approach(1.0, -1.0, 0.5), 0.5);
        assert_eq!(approach(2.0, 2.0, 0.5), 2.0);
    }
}
