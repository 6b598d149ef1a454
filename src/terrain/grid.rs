use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::color_map::{Color, FilterMode, NEUTRAL_COLOR};
use super::error::{Result, TerrainError};

pub const DEFAULT_RESOLUTION: Resolution = Resolution { x: 128, y: 128 };
pub const DEFAULT_SIZE: WorldSize = WorldSize { x: 100.0, y: 100.0 };

/// Number of samples along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub x: usize,
    pub y: usize,
}

impl Resolution {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Build a resolution from signed input (e.g. an editor field), rejecting
    /// non-positive axes.
    pub fn from_signed(x: i64, y: i64) -> Result<Self> {
        match (usize::try_from(x), usize::try_from(y)) {
            (Ok(ux), Ok(uy)) => Self::new(ux, uy).validate(),
            _ => Err(TerrainError::InvalidDimension {
                what: "resolution",
                x: x as f64,
                y: y as f64,
            }),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.x.saturating_mul(self.y)
    }

    /// Rejects empty axes and grids too large to allocate a color per cell.
    pub(crate) fn validate(self) -> Result<Self> {
        let bytes = self
            .x
            .checked_mul(self.y)
            .and_then(|cells| cells.checked_mul(std::mem::size_of::<Color>()));
        let fits = matches!(bytes, Some(bytes) if bytes <= isize::MAX as usize);
        if self.x == 0 || self.y == 0 || !fits {
            return Err(TerrainError::InvalidDimension {
                what: "resolution",
                x: self.x as f64,
                y: self.y as f64,
            });
        }
        Ok(self)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        DEFAULT_RESOLUTION
    }
}

/// World-space extent mapped onto the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSize {
    pub x: f32,
    pub y: f32,
}

impl WorldSize {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn validate(self) -> Result<Self> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.x) || !positive(self.y) {
            return Err(TerrainError::InvalidDimension {
                what: "world size",
                x: self.x as f64,
                y: self.y as f64,
            });
        }
        Ok(self)
    }
}

impl Default for WorldSize {
    fn default() -> Self {
        DEFAULT_SIZE
    }
}

/// Dense row-major grid of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    resolution: Resolution,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new_with(resolution: Resolution, value: T) -> Self {
        Self {
            resolution,
            data: vec![value; resolution.cell_count()],
        }
    }
}

impl<T> Grid<T> {
    /// Wrap an existing row-major buffer. The buffer length must match the
    /// resolution exactly.
    pub fn from_vec(resolution: Resolution, data: Vec<T>) -> Result<Self> {
        if data.len() != resolution.cell_count() {
            return Err(TerrainError::DimensionMismatch {
                expected: (resolution.x, resolution.y),
                actual: (data.len(), 1),
            });
        }
        Ok(Self { resolution, data })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> usize {
        self.resolution.x
    }

    pub fn height(&self) -> usize {
        self.resolution.y
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.resolution.x && y < self.resolution.y);
        y * self.resolution.x + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Map every cell in parallel, keeping the shape.
    pub fn par_map<U, F>(&self, f: F) -> Grid<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        Grid {
            resolution: self.resolution,
            data: self.data.par_iter().map(f).collect(),
        }
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.resolution.x;
        self.data
            .iter()
            .enumerate()
            .map(move |(idx, value)| (idx % width, idx / width, value))
    }
}

/// Height samples plus the vertical multiplier they were synthesized with.
///
/// The multiplier maps a stored height back to the normalized `[0, 1]` range
/// used for biome banding.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    cells: Grid<f32>,
    multiplier: f32,
}

impl HeightGrid {
    pub fn new(cells: Grid<f32>, multiplier: f32) -> Self {
        Self { cells, multiplier }
    }

    pub fn flat(resolution: Resolution, multiplier: f32) -> Self {
        Self::new(Grid::new_with(resolution, 0.0), multiplier)
    }

    pub fn resolution(&self) -> Resolution {
        self.cells.resolution()
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn cells(&self) -> &Grid<f32> {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut Grid<f32> {
        &mut self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        *self.cells.get(x, y)
    }

    /// Height at `(x, y)` rescaled to `[0, 1]` by the multiplier.
    pub fn normalized(&self, x: usize, y: usize) -> f32 {
        normalize_height(self.get(x, y), self.multiplier)
    }
}

pub(crate) fn normalize_height(height: f32, multiplier: f32) -> f32 {
    if multiplier.abs() <= f32::EPSILON {
        return 0.0;
    }
    (height / multiplier).clamp(0.0, 1.0)
}

/// Surface colors plus the sampling mode the renderer should use for them.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGrid {
    cells: Grid<Color>,
    filter_mode: FilterMode,
}

impl ColorGrid {
    pub fn new(cells: Grid<Color>, filter_mode: FilterMode) -> Self {
        Self { cells, filter_mode }
    }

    pub fn uniform(resolution: Resolution, color: Color, filter_mode: FilterMode) -> Self {
        Self::new(Grid::new_with(resolution, color), filter_mode)
    }

    pub fn resolution(&self) -> Resolution {
        self.cells.resolution()
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub fn cells(&self) -> &Grid<Color> {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut Grid<Color> {
        &mut self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> Color {
        *self.cells.get(x, y)
    }
}

/// Owner of the height and color grids and of the world-to-grid mapping.
#[derive(Debug, Clone)]
pub struct GridStore {
    resolution: Resolution,
    size: WorldSize,
    heights: HeightGrid,
    colors: ColorGrid,
    heights_stale: bool,
    colors_stale: bool,
}

impl Default for GridStore {
    fn default() -> Self {
        Self::allocate(DEFAULT_RESOLUTION, DEFAULT_SIZE)
    }
}

impl GridStore {
    /// Create a store with blank grids. The grids must be synthesized before
    /// they are read.
    pub fn new(resolution: Resolution, size: WorldSize) -> Result<Self> {
        Ok(Self::allocate(resolution.validate()?, size.validate()?))
    }

    fn allocate(resolution: Resolution, size: WorldSize) -> Self {
        Self {
            resolution,
            size,
            heights: HeightGrid::flat(resolution, 1.0),
            colors: ColorGrid::uniform(resolution, NEUTRAL_COLOR, FilterMode::default()),
            heights_stale: true,
            colors_stale: true,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn size(&self) -> WorldSize {
        self.size
    }

    /// Reallocate both grids at `resolution`. Contents are blank until the
    /// next synthesis pass replaces them.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<()> {
        let resolution = resolution.validate()?;
        log::debug!(
            "Resizing grids {}x{} -> {}x{}",
            self.resolution.x,
            self.resolution.y,
            resolution.x,
            resolution.y
        );
        *self = Self::allocate(resolution, self.size);
        Ok(())
    }

    /// Change the world extent. Grid dimensions are unaffected.
    pub fn set_size(&mut self, size: WorldSize) -> Result<()> {
        self.size = size.validate()?;
        log::debug!("World size set to {}x{}", self.size.x, self.size.y);
        Ok(())
    }

    fn check_shape(&self, actual: Resolution) -> Result<()> {
        if actual != self.resolution {
            return Err(TerrainError::DimensionMismatch {
                expected: (self.resolution.x, self.resolution.y),
                actual: (actual.x, actual.y),
            });
        }
        Ok(())
    }

    pub fn replace_heights(&mut self, heights: HeightGrid) -> Result<()> {
        self.check_shape(heights.resolution())?;
        self.heights = heights;
        self.heights_stale = false;
        Ok(())
    }

    pub fn replace_colors(&mut self, colors: ColorGrid) -> Result<()> {
        self.check_shape(colors.resolution())?;
        self.colors = colors;
        self.colors_stale = false;
        Ok(())
    }

    /// Swap in both grids, or neither if either has the wrong shape.
    pub fn replace(&mut self, heights: HeightGrid, colors: ColorGrid) -> Result<()> {
        self.check_shape(heights.resolution())?;
        self.check_shape(colors.resolution())?;
        self.heights = heights;
        self.colors = colors;
        self.heights_stale = false;
        self.colors_stale = false;
        Ok(())
    }

    pub fn heights(&self) -> &HeightGrid {
        &self.heights
    }

    pub fn colors(&self) -> &ColorGrid {
        &self.colors
    }

    pub(crate) fn grids_mut(&mut self) -> (&mut HeightGrid, &mut ColorGrid) {
        (&mut self.heights, &mut self.colors)
    }

    /// True after a resize until both grids have been replaced.
    pub fn needs_synthesis(&self) -> bool {
        self.heights_stale || self.colors_stale
    }

    /// Grid cells per world unit along each axis.
    pub fn world_to_grid_scale(&self) -> [f32; 2] {
        [
            self.resolution.x as f32 / self.size.x,
            self.resolution.y as f32 / self.size.y,
        ]
    }

    /// Fractional grid coordinate of a world position. Shared by the brush and
    /// the renderer so both agree on where a cell lives.
    pub fn world_to_grid(&self, world: [f32; 2]) -> [f32; 2] {
        [
            world[0] * self.resolution.x as f32 / self.size.x,
            world[1] * self.resolution.y as f32 / self.size.y,
        ]
    }

    pub fn grid_to_world(&self, grid: [f32; 2]) -> [f32; 2] {
        [
            grid[0] * self.size.x / self.resolution.x as f32,
            grid[1] * self.size.y / self.resolution.y as f32,
        ]
    }
}
