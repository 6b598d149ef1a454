// 地形系统: 网格存储 + 合成 + 雕刻

use serde::{Deserialize, Serialize};

use super::color_map::{default_biomes, synthesize_colors, Biome, ColorParameters};
use super::error::{Result, TerrainError};
use super::grid::{ColorGrid, GridStore, HeightGrid, Resolution, WorldSize};
use super::heightmap::{synthesize_heights, SynthesisParameters};
use super::sculpt::{apply_tool, Cursor, DirtyRegion, ToolState};

/// Everything an editor session persists between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub resolution: Resolution,
    pub size: WorldSize,
    pub synthesis: SynthesisParameters,
    pub biomes: Vec<Biome>,
    pub color: ColorParameters,
    pub tool: ToolState,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            size: WorldSize::default(),
            synthesis: SynthesisParameters::default(),
            biomes: default_biomes(),
            color: ColorParameters::default(),
            tool: ToolState::default(),
        }
    }
}

/// Owns the grid store and drives synthesis and sculpting against it.
///
/// Parameter changes go through [`TerrainSettings`]; the caller decides when
/// to call [`TerrainSystem::regenerate`] or [`TerrainSystem::recolor`].
#[derive(Debug, Clone)]
pub struct TerrainSystem {
    settings: TerrainSettings,
    store: GridStore,
}

/// Default settings over blank grids. Nothing is synthesized until
/// [`TerrainSystem::regenerate`] runs.
impl Default for TerrainSystem {
    fn default() -> Self {
        Self {
            settings: TerrainSettings::default(),
            store: GridStore::default(),
        }
    }
}

impl TerrainSystem {
    /// Build a store from `settings` and synthesize both grids.
    pub fn new(settings: TerrainSettings) -> Result<Self> {
        let store = GridStore::new(settings.resolution, settings.size)?;
        let mut system = Self { settings, store };
        system.regenerate()?;
        Ok(system)
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    /// Mutable access for editors. Changes take effect on the next
    /// regenerate/recolor, except the tool which applies immediately.
    pub fn settings_mut(&mut self) -> &mut TerrainSettings {
        &mut self.settings
    }

    pub fn store(&self) -> &GridStore {
        &self.store
    }

    /// Resynthesize heights and colors from the current settings. Sculpted
    /// edits are discarded.
    pub fn regenerate(&mut self) -> Result<()> {
        let resolution = self.store.resolution();
        let (heights, colors) = self.synthesize(resolution)?;
        self.store.replace(heights, colors)?;
        log::info!(
            "Regenerated {}x{} terrain (seed {})",
            resolution.x,
            resolution.y,
            self.settings.synthesis.noise.seed
        );
        Ok(())
    }

    fn synthesize(&self, resolution: Resolution) -> Result<(HeightGrid, ColorGrid)> {
        timed("Terrain synthesis", || {
            let heights = synthesize_heights(resolution, &self.settings.synthesis)?;
            let colors = synthesize_colors(&heights, &self.settings.biomes, &self.settings.color);
            Ok((heights, colors))
        })
    }

    /// Rebuild only the color grid from the current heights, keeping any
    /// sculpted height edits.
    pub fn recolor(&mut self) -> Result<()> {
        let colors = timed("Color synthesis", || {
            synthesize_colors(self.store.heights(), &self.settings.biomes, &self.settings.color)
        });
        self.store.replace_colors(colors)
    }

    /// Resynthesize the terrain at `resolution` and swap it in. On any error,
    /// from the resolution or from synthesis, the current terrain is kept.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<()> {
        let resolution = resolution.validate()?;
        let (heights, colors) = self.synthesize(resolution)?;
        self.store.set_resolution(resolution)?;
        self.store.replace(heights, colors)?;
        self.settings.resolution = resolution;
        log::info!("Resized terrain to {}x{}", resolution.x, resolution.y);
        Ok(())
    }

    pub fn set_size(&mut self, size: WorldSize) -> Result<()> {
        self.store.set_size(size)?;
        self.settings.size = size;
        Ok(())
    }

    /// Restore default settings and resynthesize.
    pub fn reinitialise(&mut self) -> Result<()> {
        *self = Self::new(TerrainSettings::default())?;
        Ok(())
    }

    /// Move the start edge of biome `index` and recolor.
    pub fn set_biome_start_height(&mut self, index: usize, value: f32) -> Result<()> {
        self.biome_mut(index)?.set_start_height(value);
        self.recolor()
    }

    /// Move the end edge of biome `index` and recolor.
    pub fn set_biome_end_height(&mut self, index: usize, value: f32) -> Result<()> {
        self.biome_mut(index)?.set_end_height(value);
        self.recolor()
    }

    /// Append a band covering the upper half of the range, or the top of the
    /// last band if there is one.
    pub fn add_biome(&mut self) -> Result<()> {
        let start = self
            .settings
            .biomes
            .last()
            .map(|biome| biome.bounds().1)
            .unwrap_or(0.5);
        self.settings
            .biomes
            .push(Biome::new(start, 1.0, [1.0, 1.0, 1.0, 1.0]));
        self.recolor()
    }

    /// Remove the last band. Does nothing when there are none.
    pub fn remove_biome(&mut self) -> Result<()> {
        if self.settings.biomes.pop().is_none() {
            return Ok(());
        }
        self.recolor()
    }

    /// One sculpting tick with the configured tool.
    pub fn apply_tool(&mut self, cursor: Cursor, elapsed: f32) -> Option<DirtyRegion> {
        if self.store.needs_synthesis() {
            log::warn!("Ignoring brush stroke on unsynthesized grids");
            return None;
        }
        apply_tool(&mut self.store, &self.settings.tool, cursor, elapsed)
    }

    fn biome_mut(&mut self, index: usize) -> Result<&mut Biome> {
        let count = self.settings.biomes.len();
        self.settings.biomes.get_mut(index).ok_or_else(|| {
            TerrainError::InvalidParameter(format!(
                "biome index {} out of range for {} biomes",
                index, count
            ))
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn timed<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let start = std::time::Instant::now();
    let result = f();
    log::info!("{} took {:?}", label, start.elapsed());
    result
}

#[cfg(target_arch = "wasm32")]
fn timed<T>(_label: &str, f: impl FnOnce() -> T) -> T {
    f()
}
