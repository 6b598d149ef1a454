use egui::{Color32, Stroke};

use crate::rendering::TerrainRenderer;
use crate::terrain::{
    Cursor, FilterMode, HeightCurve, OverlapRule, Resolution, TerrainError, TerrainSettings,
    TerrainSystem, ToolType, WorldSize,
};

#[derive(serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct TerrainApp {
    settings: TerrainSettings,
    pending_resolution: [usize; 2],
    hillshade: bool,

    #[serde(skip)]
    system: TerrainSystem,
    #[serde(skip)]
    renderer: TerrainRenderer,
    #[serde(skip)]
    texture_dirty: bool,
    #[serde(skip)]
    last_error: Option<String>,
}

impl Default for TerrainApp {
    fn default() -> Self {
        let system = TerrainSystem::default();
        let settings = system.settings().clone();
        Self {
            pending_resolution: [settings.resolution.x, settings.resolution.y],
            settings,
            hillshade: true,
            system,
            renderer: TerrainRenderer::new(),
            texture_dirty: true,
            last_error: None,
        }
    }
}

impl TerrainApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut app: TerrainApp = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();
        app.load_system();
        app
    }

    /// Synthesize the terrain once from the persisted settings, falling back
    /// to the defaults when they are rejected.
    fn load_system(&mut self) {
        match TerrainSystem::new(self.settings.clone()) {
            Ok(system) => self.system = system,
            Err(err) => {
                log::warn!("Discarding stored terrain settings: {}", err);
                let result = self.system.reinitialise();
                self.report(result);
            }
        }
        self.settings = self.system.settings().clone();
        let resolution = self.system.store().resolution();
        self.pending_resolution = [resolution.x, resolution.y];
        self.texture_dirty = true;
    }

    fn report(&mut self, result: Result<(), TerrainError>) {
        match result {
            Ok(()) => {
                self.last_error = None;
                self.texture_dirty = true;
            }
            Err(err) => {
                log::error!("{}", err);
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn regenerate(&mut self) {
        let result = self.system.regenerate();
        self.report(result);
    }

    fn recolor(&mut self) {
        let result = self.system.recolor();
        self.report(result);
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureId> {
        if self.texture_dirty {
            self.renderer.hillshade = self.hillshade;
            self.renderer.upload(ctx, self.system.store());
            self.texture_dirty = false;
        }
        self.renderer.texture_id()
    }

    fn world_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("World");
        let size = self.system.settings().size;
        let mut edited = size;
        ui.horizontal(|ui| {
            ui.label("Size");
            ui.add(egui::DragValue::new(&mut edited.x).speed(1.0).range(1.0..=10_000.0));
            ui.add(egui::DragValue::new(&mut edited.y).speed(1.0).range(1.0..=10_000.0));
        });
        if edited != size {
            let result = self.system.set_size(WorldSize::new(edited.x, edited.y));
            self.report(result);
        }

        ui.horizontal(|ui| {
            ui.label("Resolution");
            ui.add(egui::DragValue::new(&mut self.pending_resolution[0]).range(1..=2048));
            ui.add(egui::DragValue::new(&mut self.pending_resolution[1]).range(1..=2048));
        });
        let [x, y] = self.pending_resolution;
        if Resolution::new(x, y) != self.system.store().resolution() {
            ui.colored_label(
                Color32::YELLOW,
                "Applying a new resolution resynthesizes the terrain and discards sculpted edits",
            );
            if ui.button("Apply resolution").clicked() {
                let result = self.system.set_resolution(Resolution::new(x, y));
                self.report(result);
            }
        }
    }

    fn synthesis_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Terrain");
        let mut changed = false;
        let params = &mut self.system.settings_mut().synthesis;

        ui.horizontal(|ui| {
            ui.label("Seed");
            changed |= ui.add(egui::DragValue::new(&mut params.noise.seed).speed(1)).changed();
            if ui.button("Randomize").clicked() {
                params.noise.seed = rand::random();
                changed = true;
            }
        });
        changed |= ui
            .add(egui::Slider::new(&mut params.noise.scale, 0.01..=2.0).text("Scale"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut params.noise.octaves, 1..=8).text("Octaves"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut params.noise.persistence, 0.05..=1.0).text("Persistence"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut params.noise.lacunarity, 1.0..=4.0).text("Lacunarity"))
            .changed();
        ui.horizontal(|ui| {
            ui.label("Offset");
            changed |= ui
                .add(egui::DragValue::new(&mut params.noise.offset[0]).speed(0.01))
                .changed();
            changed |= ui
                .add(egui::DragValue::new(&mut params.noise.offset[1]).speed(0.01))
                .changed();
        });

        ui.label("Falloff");
        changed |= ui
            .add(egui::Slider::new(&mut params.falloff.strength, 0.0..=1.0).text("Strength"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut params.falloff.ramp, 0.5..=8.0).text("Ramp"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut params.falloff.range, 0.5..=5.0).text("Range"))
            .changed();

        changed |= ui
            .add(egui::Slider::new(&mut params.height_multiplier, 0.0..=50.0).text("Height multiplier"))
            .changed();
        ui.horizontal(|ui| {
            ui.label("Curve");
            let linear = HeightCurve::linear();
            let island = HeightCurve::island();
            if ui
                .selectable_label(params.height_curve == linear, "Linear")
                .clicked()
            {
                params.height_curve = linear;
                changed = true;
            }
            if ui
                .selectable_label(params.height_curve == island, "Island")
                .clicked()
            {
                params.height_curve = island;
                changed = true;
            }
        });

        if ui.button("Regenerate").clicked() || changed {
            self.regenerate();
        }
    }

    fn biome_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Biomes");
        let mut recolor = false;
        {
            let color = &mut self.system.settings_mut().color;
            recolor |= ui
                .add(egui::Slider::new(&mut color.interpolation, 0.0..=1.0).text("Interpolation"))
                .changed();
            ui.horizontal(|ui| {
                recolor |= ui
                    .radio_value(&mut color.filter_mode, FilterMode::Bilinear, "Bilinear")
                    .changed();
                recolor |= ui
                    .radio_value(&mut color.filter_mode, FilterMode::Point, "Point")
                    .changed();
            });
            ui.horizontal(|ui| {
                ui.label("Overlap");
                recolor |= ui
                    .radio_value(&mut color.overlap, OverlapRule::LastMatch, "Last wins")
                    .changed();
                recolor |= ui
                    .radio_value(&mut color.overlap, OverlapRule::FirstMatch, "First wins")
                    .changed();
            });
        }

        let mut edge_edit: Option<(usize, bool, f32)> = None;
        for (idx, biome) in self.system.settings_mut().biomes.iter_mut().enumerate() {
            ui.horizontal(|ui| {
                recolor |= ui
                    .color_edit_button_rgba_unmultiplied(&mut biome.color)
                    .changed();
                let mut start = biome.start_height;
                let mut end = biome.end_height;
                if ui
                    .add(egui::DragValue::new(&mut start).speed(0.005).range(0.0..=1.0))
                    .changed()
                {
                    edge_edit = Some((idx, true, start));
                }
                ui.label("to");
                if ui
                    .add(egui::DragValue::new(&mut end).speed(0.005).range(0.0..=1.0))
                    .changed()
                {
                    edge_edit = Some((idx, false, end));
                }
            });
        }

        ui.horizontal(|ui| {
            if ui.button("Add biome").clicked() {
                let result = self.system.add_biome();
                self.report(result);
            }
            if ui.button("Remove biome").clicked() {
                let result = self.system.remove_biome();
                self.report(result);
            }
        });

        if let Some((idx, is_start, value)) = edge_edit {
            let result = if is_start {
                self.system.set_biome_start_height(idx, value)
            } else {
                self.system.set_biome_end_height(idx, value)
            };
            self.report(result);
        } else if recolor {
            self.recolor();
        }
    }

    fn tool_section(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tools");
        let tool = &mut self.system.settings_mut().tool;
        ui.horizontal_wrapped(|ui| {
            for kind in ToolType::ALL {
                ui.selectable_value(&mut tool.tool, kind, kind.label());
            }
        });
        ui.add(egui::Slider::new(&mut tool.size, 0.1..=50.0).text("Size"));
        ui.add(egui::Slider::new(&mut tool.strength, 0.1..=100.0).text("Strength"));
        if tool.tool == ToolType::Paint {
            ui.horizontal(|ui| {
                ui.label("Color");
                ui.color_edit_button_rgba_unmultiplied(&mut tool.color);
            });
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui, texture_id: egui::TextureId) {
        let world = self.system.store().size();
        let available = ui.available_size();
        let aspect = world.x / world.y;
        let target_width = available.x.min(available.y * aspect);
        let target_height = target_width / aspect;

        let image = egui::Image::new((texture_id, egui::vec2(target_width, target_height)))
            .sense(egui::Sense::click_and_drag());
        let response = ui.add(image);
        let rect = response.rect;

        let cursor = match response.hover_pos() {
            Some(pos) if rect.contains(pos) => {
                let resolution = self.system.store().resolution();
                let fraction = (pos - rect.min) / rect.size();
                // Pixel fraction to cell-centered grid coordinate
                let grid = [
                    fraction.x * resolution.x as f32 - 0.5,
                    fraction.y * resolution.y as f32 - 0.5,
                ];
                Cursor::at(self.system.store().grid_to_world(grid))
            }
            _ => Cursor::invalid(),
        };

        if cursor.valid {
            let tool = &self.system.settings().tool;
            let radius = tool.size * rect.width() / world.x;
            if let Some(pos) = response.hover_pos() {
                ui.painter()
                    .circle_stroke(pos, radius, Stroke::new(1.5, Color32::WHITE));
            }
        }

        if response.drag_started() {
            log::debug!("Stroke started with {:?}", self.system.settings().tool);
        }
        if response.is_pointer_button_down_on() && ui.input(|i| i.pointer.primary_down()) {
            let elapsed = ui.input(|i| i.stable_dt);
            if let Some(region) = self.system.apply_tool(cursor, elapsed) {
                self.renderer
                    .update_region(ui.ctx(), self.system.store(), &region);
            }
            ui.ctx().request_repaint();
        }
    }
}

impl eframe::App for TerrainApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.settings = self.system.settings().clone();
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.heading("Terrasculpt");
            ui.label("Noise heightfields with biome coloring and brush sculpting.");
        });

        egui::SidePanel::left("controls").show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.world_section(ui);
                ui.separator();
                self.synthesis_section(ui);
                ui.separator();
                self.biome_section(ui);
                ui.separator();
                self.tool_section(ui);
                ui.separator();

                if ui.checkbox(&mut self.hillshade, "Hillshade").changed() {
                    self.texture_dirty = true;
                }
                if ui.button("Reset to defaults").clicked() {
                    let result = self.system.reinitialise();
                    let resolution = self.system.store().resolution();
                    self.pending_resolution = [resolution.x, resolution.y];
                    self.report(result);
                }
                if let Some(err) = &self.last_error {
                    ui.colored_label(Color32::LIGHT_RED, err.as_str());
                }
            });
        });

        let texture_id = self.ensure_texture(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(texture_id) = texture_id else {
                ui.label("No terrain texture yet");
                return;
            };
            self.canvas(ui, texture_id);

            ui.separator();
            let resolution = self.system.store().resolution();
            let size = self.system.store().size();
            ui.label(format!(
                "Resolution: {}x{} | Size: {}x{} | Tool: {}",
                resolution.x,
                resolution.y,
                size.x,
                size.y,
                self.system.settings().tool.tool.label()
            ));
        });

        if ctx.input(|i| {
            i.key_pressed(egui::Key::R) && i.modifiers.matches_logically(egui::Modifiers::CTRL)
        }) {
            self.regenerate();
        }
    }
}
