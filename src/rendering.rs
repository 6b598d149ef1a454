use egui::{ColorImage, Context, TextureHandle, TextureId, TextureOptions};

use crate::terrain::{to_rgba8, DirtyRegion, FilterMode, GridStore, HeightGrid, Resolution};

/// Light comes from the upper left, slightly above the horizon
const LIGHT_DIR: [f32; 3] = [-0.408_248_3, -0.408_248_3, 0.816_496_6];
/// Brightness of a cell facing away from the light
const AMBIENT: f32 = 0.35;

pub fn texture_options(filter_mode: FilterMode) -> TextureOptions {
    match filter_mode {
        FilterMode::Point => TextureOptions::NEAREST,
        FilterMode::Bilinear => TextureOptions::LINEAR,
    }
}

/// Keeps a single texture in sync with the grid store.
pub struct TerrainRenderer {
    texture: Option<TextureHandle>,
    resolution: Resolution,
    options: TextureOptions,
    pub hillshade: bool,
}

impl Default for TerrainRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainRenderer {
    pub fn new() -> Self {
        Self {
            texture: None,
            resolution: Resolution::new(0, 0),
            options: TextureOptions::LINEAR,
            hillshade: true,
        }
    }

    pub fn texture_id(&self) -> Option<TextureId> {
        self.texture.as_ref().map(|t| t.id())
    }

    /// Re-upload the whole grid.
    pub fn upload(&mut self, ctx: &Context, store: &GridStore) -> TextureId {
        let resolution = store.resolution();
        let options = texture_options(store.colors().filter_mode());
        let full = DirtyRegion {
            min: [0, 0],
            max: [resolution.x - 1, resolution.y - 1],
        };
        let image = render_region(store, &full, self.hillshade);

        let tex = ctx.load_texture("terrain", image, options);
        let id = tex.id();
        self.texture = Some(tex);
        self.resolution = resolution;
        self.options = options;
        id
    }

    /// Patch only `region` of the texture. Falls back to a full upload when
    /// the texture is missing or its shape or sampling changed.
    pub fn update_region(&mut self, ctx: &Context, store: &GridStore, region: &DirtyRegion) {
        let options = texture_options(store.colors().filter_mode());
        if self.resolution != store.resolution() || self.options != options {
            self.upload(ctx, store);
            return;
        }
        // Shading depends on neighbouring heights
        let region = grow(region, store.resolution());
        match self.texture.as_mut() {
            Some(tex) => {
                let image = render_region(store, &region, self.hillshade);
                tex.set_partial(region.min, image, options);
            }
            None => {
                self.upload(ctx, store);
            }
        }
    }
}

fn grow(region: &DirtyRegion, resolution: Resolution) -> DirtyRegion {
    DirtyRegion {
        min: [region.min[0].saturating_sub(1), region.min[1].saturating_sub(1)],
        max: [
            (region.max[0] + 1).min(resolution.x - 1),
            (region.max[1] + 1).min(resolution.y - 1),
        ],
    }
}

/// Colors for the cells of `region`, optionally lit by the height gradient.
pub fn render_region(store: &GridStore, region: &DirtyRegion, hillshade: bool) -> ColorImage {
    let heights = store.heights();
    let colors = store.colors();
    let size = store.size();
    let resolution = store.resolution();
    let spacing = [size.x / resolution.x as f32, size.y / resolution.y as f32];

    let mut rgba: Vec<[u8; 4]> = Vec::with_capacity(region.width() * region.height());
    for y in region.min[1]..=region.max[1] {
        for x in region.min[0]..=region.max[0] {
            let color = colors.get(x, y);
            if hillshade {
                let shade = shade_factor(heights, x, y, spacing);
                rgba.push(to_rgba8([color[0] * shade, color[1] * shade, color[2] * shade, color[3]]));
            } else {
                rgba.push(to_rgba8(color));
            }
        }
    }
    ColorImage::from_rgba_unmultiplied([region.width(), region.height()], bytemuck::cast_slice(&rgba))
}

/// Lambert shading from central differences, scaled so flat ground is 1.0.
pub fn shade_factor(heights: &HeightGrid, x: usize, y: usize, spacing: [f32; 2]) -> f32 {
    let resolution = heights.resolution();
    let (x0, x1) = (x.saturating_sub(1), (x + 1).min(resolution.x - 1));
    let (y0, y1) = (y.saturating_sub(1), (y + 1).min(resolution.y - 1));

    let dx = if x1 > x0 {
        (heights.get(x1, y) - heights.get(x0, y)) / ((x1 - x0) as f32 * spacing[0])
    } else {
        0.0
    };
    let dy = if y1 > y0 {
        (heights.get(x, y1) - heights.get(x, y0)) / ((y1 - y0) as f32 * spacing[1])
    } else {
        0.0
    };

    let len = (dx * dx + dy * dy + 1.0).sqrt();
    let normal = [-dx / len, -dy / len, 1.0 / len];
    let lambert = (normal[0] * LIGHT_DIR[0] + normal[1] * LIGHT_DIR[1] + normal[2] * LIGHT_DIR[2]).max(0.0);
    AMBIENT + (1.0 - AMBIENT) * lambert / LIGHT_DIR[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{ColorGrid, Grid, WorldSize, NEUTRAL_COLOR};

    fn store(heights: Vec<f32>, width: usize, height: usize) -> GridStore {
        let resolution = Resolution::new(width, height);
        let mut store = GridStore::new(resolution, WorldSize::new(width as f32, height as f32)).unwrap();
        store
            .replace(
                HeightGrid::new(Grid::from_vec(resolution, heights).unwrap(), 10.0),
                ColorGrid::uniform(resolution, NEUTRAL_COLOR, FilterMode::Point),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_flat_ground_is_unshaded() {
        let store = store(vec![2.0; 16], 4, 4);
        for (x, y, _) in store.heights().cells().iter() {
            assert!((shade_factor(store.heights(), x, y, [1.0, 1.0]) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_slopes_facing_light_are_brighter() {
        // Rising toward +x tilts the surface toward a light in the -x direction
        let rising: Vec<f32> = (0..9).map(|i| (i % 3) as f32).collect();
        let falling: Vec<f32> = (0..9).map(|i| 2.0 - (i % 3) as f32).collect();
        let a = store(rising, 3, 3);
        let b = store(falling, 3, 3);

        let toward = shade_factor(a.heights(), 1, 1, [1.0, 1.0]);
        let away = shade_factor(b.heights(), 1, 1, [1.0, 1.0]);
        assert!(toward > 1.0 && away < 1.0, "{} {}", toward, away);
        assert!(away >= AMBIENT);
    }

    #[test]
    fn test_render_region_size() {
        let store = store(vec![0.0; 20], 5, 4);
        let region = DirtyRegion {
            min: [1, 1],
            max: [3, 2],
        };
        let image = render_region(&store, &region, false);
        assert_eq!(image.size, [3, 2]);
        assert_eq!(image.pixels.len(), 6);
        assert_eq!(image.pixels[0].to_array(), [128, 128, 128, 255]);
    }

    #[test]
    fn test_grow_is_clamped() {
        let region = grow(
            &DirtyRegion {
                min: [0, 2],
                max: [4, 3],
            },
            Resolution::new(5, 5),
        );
        assert_eq!(region.min, [0, 1]);
        assert_eq!(region.max, [4, 4]);
    }
}
