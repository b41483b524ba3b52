//! egui panels: part/colour editor on the left, tile and ceiling catalogs on
//! the right, host actions along the bottom.

use crate::assets::TextureLibrary;
use crate::catalog::{Catalog, CatalogDomain};
use crate::color::HexColor;
use crate::customize::{ApplyOutcome, CustomizerSession, TextureLoader};
use crate::scene::TextureHandle;
use std::collections::HashMap;

const THUMBNAIL_SIZE: egui::Vec2 = egui::vec2(72.0, 46.0);
const SWATCH_SIZE: egui::Vec2 = egui::vec2(40.0, 40.0);
const SELECTED_STROKE: egui::Color32 = egui::Color32::from_rgb(0x1f, 0x8b, 0x24);
const ACCENT: egui::Color32 = egui::Color32::from_rgb(0xa2, 0x00, 0x00);
const HOST_BUTTON: egui::Color32 = egui::Color32::from_rgb(0x80, 0x00, 0x00);
const MIN_TILE_SCALE: f32 = 0.1;

/// What the user asked for this frame. Editor changes are applied to the
/// session by [`UiActions::apply`]; host actions are handled by the app.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UiActions {
    pub color: Option<HexColor>,
    pub tile_scale: Option<[f32; 2]>,
    pub category: Option<(CatalogDomain, String)>,
    pub item: Option<(CatalogDomain, String)>,
    pub apply_color: bool,
    pub apply: Option<CatalogDomain>,
    pub download: bool,
    pub share: bool,
    pub reset: bool,
}

impl UiActions {
    /// Feeds editor changes into the session in the order a user would make
    /// them: edit first, then commit.
    pub fn apply(&self, session: &mut CustomizerSession, catalog: &Catalog) -> Vec<ApplyOutcome> {
        if let Some(color) = &self.color {
            session.set_color(color.clone());
        }
        if let Some(scale) = self.tile_scale {
            session.set_tile_scale(scale);
        }
        if let Some((domain, category)) = &self.category {
            session.select_category(*domain, category.clone());
        }
        if let Some((domain, image)) = &self.item {
            if let Err(err) = session.choose_item(catalog, *domain, image) {
                log::warn!("Ignoring catalog pick: {}", err);
            }
        }

        let mut outcomes = Vec::new();
        if self.apply_color {
            outcomes.push(session.apply_color());
        }
        if let Some(domain) = self.apply {
            outcomes.push(match domain {
                CatalogDomain::WallTexture => session.apply_texture(),
                CatalogDomain::Tile => session.apply_tile(),
                CatalogDomain::Ceiling => session.apply_ceiling(),
            });
        }
        for outcome in outcomes.iter().filter(|outcome| !outcome.applied()) {
            log::debug!("Apply skipped: {:?}", outcome);
        }
        outcomes
    }
}

pub struct UiView<'a> {
    pub catalog: &'a Catalog,
    pub session: &'a CustomizerSession,
    pub textures: &'a mut TextureLibrary,
    pub model_name: &'a str,
}

#[derive(Default)]
pub struct UiState {
    alert: Option<String>,
    thumbnails: HashMap<TextureHandle, egui::TextureHandle>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
    }

    pub fn draw(&mut self, ctx: &egui::Context, view: UiView<'_>) -> UiActions {
        let UiView {
            catalog,
            session,
            textures,
            model_name,
        } = view;
        let mut actions = UiActions::default();

        egui::TopBottomPanel::top("title_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Customize House Model");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(model_name);
                });
            });
        });

        egui::TopBottomPanel::bottom("host_actions").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                let width = ui.available_width();
                ui.add_space((width - 3.0 * 110.0).max(0.0) * 0.5);
                actions.download = host_button(ui, "Download");
                actions.share = host_button(ui, "Share");
                actions.reset = host_button(ui, "Reset");
            });
            ui.add_space(4.0);
        });

        egui::SidePanel::left("editor_panel")
            .resizable(false)
            .exact_width(270.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.selected_part(ui, session);
                    ui.separator();
                    self.colour_editor(ui, catalog, session, &mut actions);
                    ui.separator();
                    self.catalog_section(ui, CatalogDomain::WallTexture, catalog, session, textures, &mut actions);
                });
            });

        egui::SidePanel::right("catalog_panel")
            .resizable(false)
            .exact_width(270.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.catalog_section(ui, CatalogDomain::Ceiling, catalog, session, textures, &mut actions);
                    ui.separator();
                    self.catalog_section(ui, CatalogDomain::Tile, catalog, session, textures, &mut actions);
                });
            });

        if let Some(message) = self.alert.clone() {
            let mut dismissed = false;
            egui::Window::new("Notice")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            if dismissed {
                self.alert = None;
            }
        }

        actions
    }

    fn selected_part(&self, ui: &mut egui::Ui, session: &CustomizerSession) {
        ui.vertical_centered(|ui| {
            ui.heading("Selected Part");
            match session.selection() {
                Some(selection) => ui.label(egui::RichText::new(&selection.name).strong().color(ACCENT)),
                None => ui.label("Click on a part of the model"),
            };
        });
    }

    fn colour_editor(
        &self,
        ui: &mut egui::Ui,
        catalog: &Catalog,
        session: &CustomizerSession,
        actions: &mut UiActions,
    ) {
        let selected = session.selection().is_some();
        ui.vertical_centered(|ui| ui.heading("Choose Colour"));

        egui::ScrollArea::vertical()
            .id_salt("palette")
            .max_height(170.0)
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for swatch in &catalog.palette {
                        let [r, g, b] = swatch.code.to_rgb8();
                        let active = session.color() == &swatch.code;
                        let stroke = if active {
                            egui::Stroke::new(2.0, egui::Color32::BLACK)
                        } else {
                            egui::Stroke::new(1.0, egui::Color32::GRAY)
                        };
                        let response = ui
                            .add(
                                egui::Button::new("")
                                    .fill(egui::Color32::from_rgb(r, g, b))
                                    .stroke(stroke)
                                    .min_size(SWATCH_SIZE),
                            )
                            .on_hover_text(&swatch.name);
                        if response.clicked() {
                            actions.color = Some(swatch.code.clone());
                        }
                    }
                });
            });

        ui.horizontal(|ui| {
            ui.label("Choose Custom Colour");
            ui.add_enabled_ui(selected, |ui| {
                let mut rgb = session.color().to_rgb8();
                if ui.color_edit_button_srgb(&mut rgb).changed() {
                    actions.color = Some(HexColor::from_rgb8(rgb));
                }
            });
        });

        ui.vertical_centered(|ui| {
            if ui
                .add_enabled(session.can_apply(None), egui::Button::new("Apply Colour"))
                .clicked()
            {
                actions.apply_color = true;
            }
        });
    }

    fn catalog_section(
        &mut self,
        ui: &mut egui::Ui,
        domain: CatalogDomain,
        catalog: &Catalog,
        session: &CustomizerSession,
        textures: &mut TextureLibrary,
        actions: &mut UiActions,
    ) {
        let picker = session.picker(domain);
        ui.vertical_centered(|ui| ui.heading(section_heading(domain)));

        let active = picker.active().unwrap_or("");
        egui::ComboBox::from_id_salt(("category", domain))
            .width(ui.available_width())
            .selected_text(active)
            .show_ui(ui, |ui| {
                for category in catalog.categories(domain) {
                    let name = category.category.as_str();
                    if ui.selectable_label(name == active, name).clicked() && name != active {
                        actions.category = Some((domain, name.to_string()));
                    }
                }
            });

        egui::ScrollArea::vertical()
            .id_salt(("items", domain, active))
            .max_height(180.0)
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for entry in catalog.items(domain, active) {
                        let chosen = picker.tentative() == Some(entry.image.as_str());
                        let thumbnail = self.thumbnail(ui.ctx(), textures, &entry.image);
                        let button = match thumbnail {
                            Some(texture) => egui::Button::image((texture, THUMBNAIL_SIZE)),
                            None => egui::Button::new(&entry.name).min_size(THUMBNAIL_SIZE),
                        };
                        let mut button = button.selected(chosen);
                        if chosen {
                            button = button.stroke(egui::Stroke::new(3.0, SELECTED_STROKE));
                        }
                        if ui.add(button).on_hover_text(&entry.name).clicked() {
                            actions.item = Some((domain, entry.image.clone()));
                        }
                    }
                });
            });

        let has_item = picker.tentative().is_some();
        let [mut x, mut y] = actions.tile_scale.unwrap_or(session.tile_scale());
        ui.horizontal(|ui| {
            ui.label(scale_label(domain));
            ui.add_enabled_ui(has_item, |ui| {
                let mut changed = false;
                ui.label("X:");
                changed |= ui.add(scale_drag(&mut x)).changed();
                ui.label("Y:");
                changed |= ui.add(scale_drag(&mut y)).changed();
                if changed {
                    actions.tile_scale = Some([x, y]);
                }
            });
        });

        ui.vertical_centered(|ui| {
            if ui
                .add_enabled(session.can_apply(Some(domain)), egui::Button::new(apply_label(domain)))
                .clicked()
            {
                actions.apply = Some(domain);
            }
        });
    }

    fn thumbnail(
        &mut self,
        ctx: &egui::Context,
        textures: &mut TextureLibrary,
        source: &str,
    ) -> Option<egui::TextureId> {
        let handle = textures.load(source);
        if let Some(texture) = self.thumbnails.get(&handle) {
            return Some(texture.id());
        }
        let image = textures.image(handle)?;
        let small = image::imageops::thumbnail(
            &**image,
            (THUMBNAIL_SIZE.x * 2.0) as u32,
            (THUMBNAIL_SIZE.y * 2.0) as u32,
        );
        let pixels = egui::ColorImage::from_rgba_unmultiplied(
            [small.width() as usize, small.height() as usize],
            small.as_raw(),
        );
        let texture = ctx.load_texture(format!("thumb_{}", source), pixels, egui::TextureOptions::LINEAR);
        let id = texture.id();
        self.thumbnails.insert(handle, texture);
        Some(id)
    }
}

fn host_button(ui: &mut egui::Ui, label: &str) -> bool {
    ui.add(
        egui::Button::new(egui::RichText::new(label).strong().color(egui::Color32::WHITE))
            .fill(HOST_BUTTON)
            .corner_radius(egui::CornerRadius::same(10))
            .min_size(egui::vec2(100.0, 28.0)),
    )
    .clicked()
}

fn scale_drag(value: &mut f32) -> egui::DragValue<'_> {
    egui::DragValue::new(value)
        .range(MIN_TILE_SCALE..=100.0)
        .speed(0.1)
        .fixed_decimals(1)
}

fn section_heading(domain: CatalogDomain) -> &'static str {
    match domain {
        CatalogDomain::WallTexture => "Choose Room",
        CatalogDomain::Tile => "Choose Tiles",
        CatalogDomain::Ceiling => "Choose False Ceiling",
    }
}

fn scale_label(domain: CatalogDomain) -> &'static str {
    match domain {
        CatalogDomain::Ceiling => "Scale",
        _ => "Tile Scale",
    }
}

fn apply_label(domain: CatalogDomain) -> &'static str {
    match domain {
        CatalogDomain::WallTexture => "Apply Tile Pattern",
        CatalogDomain::Tile => "Apply Tile",
        CatalogDomain::Ceiling => "Apply False Ceiling",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomizerDefaults;
    use crate::customize::MaterialOverride;
    use crate::scene::MeshId;

    fn session() -> (Catalog, CustomizerSession) {
        let catalog = Catalog::builtin().unwrap();
        let session = CustomizerSession::new(&catalog, CustomizerDefaults::default());
        (catalog, session)
    }

    fn first_item(catalog: &Catalog, session: &CustomizerSession, domain: CatalogDomain) -> String {
        let category = session.picker(domain).active().unwrap();
        catalog.items(domain, category)[0].image.clone()
    }

    #[test]
    fn edits_land_before_commit() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, MeshId(0), "Wall");
        let image = first_item(&catalog, &session, CatalogDomain::Tile);

        let actions = UiActions {
            tile_scale: Some([2.0, 3.0]),
            item: Some((CatalogDomain::Tile, image.clone())),
            apply: Some(CatalogDomain::Tile),
            ..Default::default()
        };
        let outcomes = actions.apply(&mut session, &catalog);
        assert_eq!(outcomes, vec![ApplyOutcome::Applied(MeshId(0))]);
        assert_eq!(
            session.overrides().get(MeshId(0)),
            Some(&MaterialOverride::textured(image, [2.0, 3.0]))
        );
    }

    #[test]
    fn colour_pick_then_apply_writes_colour_record() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, MeshId(0), "Wall");
        let color = HexColor::parse("#112233").unwrap();
        let actions = UiActions {
            color: Some(color.clone()),
            apply_color: true,
            ..Default::default()
        };
        actions.apply(&mut session, &catalog);
        assert_eq!(
            session.overrides().get(MeshId(0)),
            Some(&MaterialOverride::color_only(color))
        );
    }

    #[test]
    fn unknown_item_is_ignored_and_apply_reports_nothing_chosen() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, MeshId(0), "Wall");
        let actions = UiActions {
            item: Some((CatalogDomain::Ceiling, "missing.jpg".to_string())),
            apply: Some(CatalogDomain::Ceiling),
            ..Default::default()
        };
        assert_eq!(actions.apply(&mut session, &catalog), vec![ApplyOutcome::NothingChosen]);
        assert!(session.overrides().is_empty());
    }

    #[test]
    fn category_switch_clears_choice() {
        let (catalog, mut session) = session();
        let image = first_item(&catalog, &session, CatalogDomain::WallTexture);
        session.choose_item(&catalog, CatalogDomain::WallTexture, &image).unwrap();
        let other = catalog.categories(CatalogDomain::WallTexture)[1].category.clone();
        UiActions {
            category: Some((CatalogDomain::WallTexture, other)),
            ..Default::default()
        }
        .apply(&mut session, &catalog);
        assert_eq!(session.picker(CatalogDomain::WallTexture).tentative(), None);
    }
}
