//! Customization session: which part is selected, what the editor currently
//! holds, and the override records committed so far.

pub mod overrides;
pub mod picker;
pub mod reconcile;

pub use overrides::{MaterialOverride, OverrideMap};
pub use picker::{CategoryPicker, PickError};
pub use reconcile::{reconcile, HoverStyle, TextureLoader};

use crate::catalog::{Catalog, CatalogDomain};
use crate::color::HexColor;
use crate::config::CustomizerDefaults;
use crate::scene::MeshId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub id: MeshId,
    /// Material name of the picked mesh, shown in the panel.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(MeshId),
    NoSelection,
    NothingChosen,
}

impl ApplyOutcome {
    pub fn applied(self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone)]
pub struct CustomizerSession {
    defaults: CustomizerDefaults,
    selection: Option<Selection>,
    color: HexColor,
    tile_scale: [f32; 2],
    walls: CategoryPicker,
    tiles: CategoryPicker,
    ceilings: CategoryPicker,
    overrides: OverrideMap,
    hovered: Option<MeshId>,
    revision: u64,
}

impl CustomizerSession {
    pub fn new(catalog: &Catalog, defaults: CustomizerDefaults) -> Self {
        let picker = |domain, preferred: &Option<String>| {
            CategoryPicker::new(domain, catalog.initial_category(domain, preferred.as_deref()))
        };
        Self {
            walls: picker(CatalogDomain::WallTexture, &defaults.wall_category),
            tiles: picker(CatalogDomain::Tile, &defaults.tile_category),
            ceilings: picker(CatalogDomain::Ceiling, &defaults.ceiling_category),
            selection: None,
            color: defaults.color.clone(),
            tile_scale: [defaults.initial_tile_scale; 2],
            overrides: OverrideMap::new(),
            hovered: None,
            revision: 0,
            defaults,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn color(&self) -> &HexColor {
        &self.color
    }

    pub fn tile_scale(&self) -> [f32; 2] {
        self.tile_scale
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    pub fn hovered(&self) -> Option<MeshId> {
        self.hovered
    }

    /// Bumped by every state change that can affect resolved materials or the panels.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn picker(&self, domain: CatalogDomain) -> &CategoryPicker {
        match domain {
            CatalogDomain::WallTexture => &self.walls,
            CatalogDomain::Tile => &self.tiles,
            CatalogDomain::Ceiling => &self.ceilings,
        }
    }

    fn picker_mut(&mut self, domain: CatalogDomain) -> &mut CategoryPicker {
        match domain {
            CatalogDomain::WallTexture => &mut self.walls,
            CatalogDomain::Tile => &mut self.tiles,
            CatalogDomain::Ceiling => &mut self.ceilings,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Loads the editor from the part's committed record, or from defaults.
    pub fn select_part(&mut self, catalog: &Catalog, id: MeshId, name: impl Into<String>) {
        let name = name.into();
        log::debug!("Selected {} ({})", id, name);
        let existing = self.overrides.get(id).cloned().unwrap_or_default();

        self.color = existing
            .color
            .clone()
            .unwrap_or_else(|| self.defaults.color.clone());
        let fallback = self.defaults.selection_tile_scale;
        self.tile_scale = [
            existing.tile_scale_x.filter(|v| *v != 0.0).unwrap_or(fallback),
            existing.tile_scale_y.filter(|v| *v != 0.0).unwrap_or(fallback),
        ];

        // Every picker mirrors the part's record; pickers that do not list it are cleared.
        let texture = existing.texture.as_deref();
        for domain in CatalogDomain::ALL {
            self.picker_mut(domain).restore_if_present(catalog, texture);
        }

        self.selection = Some(Selection { id, name });
        self.touch();
    }

    pub fn set_color(&mut self, color: HexColor) {
        if self.color != color {
            self.color = color;
            self.touch();
        }
    }

    pub fn set_tile_scale(&mut self, scale: [f32; 2]) {
        if self.tile_scale != scale {
            self.tile_scale = scale;
            self.touch();
        }
    }

    pub fn select_category(&mut self, domain: CatalogDomain, category: impl Into<String>) {
        let category = category.into();
        log::debug!("{} category -> {}", domain.label(), category);
        self.picker_mut(domain).select_category(category);
        self.touch();
    }

    pub fn choose_item(
        &mut self,
        catalog: &Catalog,
        domain: CatalogDomain,
        image: &str,
    ) -> Result<(), PickError> {
        self.picker_mut(domain).choose(catalog, image)?;
        self.touch();
        Ok(())
    }

    pub fn can_apply(&self, domain: Option<CatalogDomain>) -> bool {
        self.selection.is_some()
            && domain.map_or(true, |domain| self.picker(domain).tentative().is_some())
    }

    pub fn apply_color(&mut self) -> ApplyOutcome {
        let Some(id) = self.selection.as_ref().map(|selection| selection.id) else {
            return ApplyOutcome::NoSelection;
        };
        let record = MaterialOverride::color_only(self.color.clone());
        self.commit(id, record)
    }

    /// Wall pattern from the room picker.
    pub fn apply_texture(&mut self) -> ApplyOutcome {
        self.apply_from(CatalogDomain::WallTexture)
    }

    pub fn apply_tile(&mut self) -> ApplyOutcome {
        self.apply_from(CatalogDomain::Tile)
    }

    pub fn apply_ceiling(&mut self) -> ApplyOutcome {
        self.apply_from(CatalogDomain::Ceiling)
    }

    fn apply_from(&mut self, domain: CatalogDomain) -> ApplyOutcome {
        let Some(id) = self.selection.as_ref().map(|selection| selection.id) else {
            return ApplyOutcome::NoSelection;
        };
        let Some(texture) = self.picker(domain).tentative().map(str::to_string) else {
            return ApplyOutcome::NothingChosen;
        };
        let record = MaterialOverride::textured(texture, self.tile_scale);
        self.commit(id, record)
    }

    fn commit(&mut self, id: MeshId, record: MaterialOverride) -> ApplyOutcome {
        log::debug!(
            "Override {} -> {}",
            id,
            serde_json::to_string(&record).unwrap_or_default()
        );
        if self.overrides.set(id, record) {
            self.touch();
        }
        ApplyOutcome::Applied(id)
    }

    pub fn hover(&mut self, id: MeshId) {
        if self.hovered != Some(id) {
            self.hovered = Some(id);
            self.touch();
        }
    }

    pub fn unhover(&mut self) {
        if self.hovered.take().is_some() {
            self.touch();
        }
    }

    /// Back to the state of a fresh launch.
    pub fn reset(&mut self, catalog: &Catalog) {
        let revision = self.revision;
        let cleared = self.overrides.len();
        *self = Self::new(catalog, self.defaults.clone());
        self.revision = revision + 1;
        log::info!("Customization reset ({} overrides cleared)", cleared);
    }
}

#[cfg(test)]
mod tests {
    use super::reconcile::test_support::RecordingLoader;
    use super::*;
    use crate::scene::test_support::house;

    const WALL: MeshId = MeshId(0);
    const FLOOR: MeshId = MeshId(1);
    const DAMASK: &str = "assets/textures/walls/damask_ivory.png";
    const MARBLE: &str = "assets/textures/tiles/carrara_marble.png";
    const GYPSUM: &str = "assets/textures/ceilings/plain_gypsum.png";

    fn session() -> (Catalog, CustomizerSession) {
        let catalog = Catalog::builtin().unwrap();
        let session = CustomizerSession::new(&catalog, CustomizerDefaults::default());
        (catalog, session)
    }

    fn hex(value: &str) -> HexColor {
        HexColor::parse(value).unwrap()
    }

    #[test]
    fn starts_with_configured_categories_and_defaults() {
        let (catalog, session) = session();
        assert_eq!(session.picker(CatalogDomain::WallTexture).active(), Some("Master Bedroom"));
        assert_eq!(session.picker(CatalogDomain::Tile).active(), Some("Vitrified Tile"));
        assert_eq!(
            session.picker(CatalogDomain::Ceiling).active(),
            catalog.first_category(CatalogDomain::Ceiling)
        );
        assert_eq!(session.color().as_str(), "#ff6347");
        assert_eq!(session.tile_scale(), [1.0, 1.0]);
        assert!(session.selection().is_none());
    }

    #[test]
    fn apply_colour_writes_colour_only_record() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, WALL, "Wall");
        session.set_color(hex("#112233"));
        assert_eq!(session.apply_color(), ApplyOutcome::Applied(WALL));
        assert_eq!(
            session.overrides().get(WALL),
            Some(&MaterialOverride::color_only(hex("#112233")))
        );
        assert!(session.overrides().get(FLOOR).is_none());
    }

    #[test]
    fn reselecting_another_part_leaves_first_record_alone() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, WALL, "Wall");
        session.set_color(hex("#112233"));
        session.apply_color();
        let committed = session.overrides().get(WALL).cloned();

        session.select_part(&catalog, FLOOR, "Floor");
        assert_eq!(session.color().as_str(), "#ff6347");
        session.set_color(hex("#445566"));
        assert_eq!(session.overrides().get(WALL).cloned(), committed);
    }

    #[test]
    fn texture_apply_replaces_prior_colour_record() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, WALL, "Wall");
        session.set_color(hex("#112233"));
        session.apply_color();

        session.choose_item(&catalog, CatalogDomain::WallTexture, DAMASK).unwrap();
        session.set_tile_scale([2.0, 3.0]);
        assert_eq!(session.apply_texture(), ApplyOutcome::Applied(WALL));
        assert_eq!(
            session.overrides().get(WALL),
            Some(&MaterialOverride::textured(DAMASK, [2.0, 3.0]))
        );
    }

    #[test]
    fn tile_and_ceiling_apply_use_their_own_pickers() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, FLOOR, "Floor");
        assert_eq!(session.apply_tile(), ApplyOutcome::NothingChosen);
        session.choose_item(&catalog, CatalogDomain::Tile, MARBLE).unwrap();
        assert_eq!(session.apply_tile(), ApplyOutcome::Applied(FLOOR));
        assert_eq!(
            session.overrides().get(FLOOR).and_then(|r| r.texture.as_deref()),
            Some(MARBLE)
        );

        session.select_part(&catalog, WALL, "Ceiling");
        session.choose_item(&catalog, CatalogDomain::Ceiling, GYPSUM).unwrap();
        assert_eq!(session.apply_ceiling(), ApplyOutcome::Applied(WALL));
        assert_eq!(
            session.overrides().get(WALL),
            Some(&MaterialOverride::textured(GYPSUM, [5.0, 5.0]))
        );
    }

    #[test]
    fn apply_without_selection_or_item_is_a_no_op() {
        let (catalog, mut session) = session();
        assert_eq!(session.apply_color(), ApplyOutcome::NoSelection);
        session.choose_item(&catalog, CatalogDomain::Tile, MARBLE).unwrap();
        assert_eq!(session.apply_tile(), ApplyOutcome::NoSelection);
        assert!(!session.can_apply(None));

        session.select_part(&catalog, WALL, "Wall");
        assert_eq!(session.apply_texture(), ApplyOutcome::NothingChosen);
        assert_eq!(session.apply_tile(), ApplyOutcome::NothingChosen);
        assert!(!session.can_apply(Some(CatalogDomain::WallTexture)));
        assert!(session.can_apply(None));
        session.choose_item(&catalog, CatalogDomain::Tile, MARBLE).unwrap();
        assert!(session.can_apply(Some(CatalogDomain::Tile)));
        assert!(session.overrides().is_empty());
    }

    #[test]
    fn selecting_part_restores_committed_editor_state() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, WALL, "Wall");
        assert_eq!(session.tile_scale(), [5.0, 5.0]);
        session.choose_item(&catalog, CatalogDomain::WallTexture, DAMASK).unwrap();
        session.set_tile_scale([2.0, 3.0]);
        session.apply_texture();

        session.select_part(&catalog, FLOOR, "Floor");
        assert_eq!(session.picker(CatalogDomain::WallTexture).tentative(), None);
        assert_eq!(session.tile_scale(), [5.0, 5.0]);

        session.select_part(&catalog, WALL, "Wall");
        assert_eq!(session.picker(CatalogDomain::WallTexture).tentative(), Some(DAMASK));
        assert_eq!(session.tile_scale(), [2.0, 3.0]);
    }

    #[test]
    fn selecting_part_resets_every_picker_to_its_record() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, FLOOR, "Floor");
        session.choose_item(&catalog, CatalogDomain::Tile, MARBLE).unwrap();
        session.apply_tile();
        session.choose_item(&catalog, CatalogDomain::Ceiling, GYPSUM).unwrap();
        session.choose_item(&catalog, CatalogDomain::WallTexture, DAMASK).unwrap();

        session.select_part(&catalog, WALL, "Wall");
        for domain in CatalogDomain::ALL {
            assert_eq!(session.picker(domain).tentative(), None, "{:?}", domain);
        }

        session.select_part(&catalog, FLOOR, "Floor");
        assert_eq!(session.picker(CatalogDomain::Tile).tentative(), Some(MARBLE));
        assert_eq!(session.picker(CatalogDomain::Ceiling).tentative(), None);
        assert_eq!(session.picker(CatalogDomain::WallTexture).tentative(), None);
    }

    #[test]
    fn category_switch_clears_tentative_but_keeps_selection() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, WALL, "Wall");
        session.choose_item(&catalog, CatalogDomain::WallTexture, DAMASK).unwrap();
        session.select_category(CatalogDomain::WallTexture, "Living Room");
        assert_eq!(session.picker(CatalogDomain::WallTexture).tentative(), None);
        assert_eq!(session.selection().map(|s| s.id), Some(WALL));
        assert!(session
            .choose_item(&catalog, CatalogDomain::WallTexture, DAMASK)
            .is_err());
    }

    #[test]
    fn reapplying_identical_record_keeps_resolved_materials() {
        let (catalog, mut session) = session();
        let mut scene = house();
        let mut loader = RecordingLoader::default();
        let style = HoverStyle::default();
        session.select_part(&catalog, WALL, "Wall");
        session.choose_item(&catalog, CatalogDomain::WallTexture, DAMASK).unwrap();
        session.apply_texture();
        reconcile(&mut scene, session.overrides(), None, &mut loader, &style);
        let material = scene.mesh(WALL).unwrap().material().clone();
        let revision = scene.mesh(WALL).unwrap().material_revision();

        let session_revision = session.revision();
        assert!(session.apply_texture().applied());
        assert_eq!(session.revision(), session_revision);
        let stats = reconcile(&mut scene, session.overrides(), None, &mut loader, &style);
        assert_eq!(stats.changed, 0);
        assert_eq!(scene.mesh(WALL).unwrap().material(), &material);
        assert_eq!(scene.mesh(WALL).unwrap().material_revision(), revision);
    }

    #[test]
    fn hover_and_unhover_never_touch_overrides() {
        let (catalog, mut session) = session();
        let mut scene = house();
        let mut loader = RecordingLoader::default();
        let style = HoverStyle::default();
        session.select_part(&catalog, WALL, "Wall");
        session.apply_color();
        reconcile(&mut scene, session.overrides(), session.hovered(), &mut loader, &style);
        let before = scene.mesh(WALL).unwrap().material().clone();
        let committed = session.overrides().clone();

        session.hover(WALL);
        reconcile(&mut scene, session.overrides(), session.hovered(), &mut loader, &style);
        assert_ne!(scene.mesh(WALL).unwrap().material(), &before);

        session.unhover();
        reconcile(&mut scene, session.overrides(), session.hovered(), &mut loader, &style);
        assert_eq!(scene.mesh(WALL).unwrap().material(), &before);
        assert_eq!(session.overrides(), &committed);
    }

    #[test]
    fn reset_restores_launch_state_and_advances_revision() {
        let (catalog, mut session) = session();
        session.select_part(&catalog, WALL, "Wall");
        session.set_color(hex("#112233"));
        session.apply_color();
        session.select_category(CatalogDomain::Tile, "Wooden Tile");
        session.hover(FLOOR);
        let revision = session.revision();

        session.reset(&catalog);
        assert!(session.overrides().is_empty());
        assert!(session.selection().is_none());
        assert_eq!(session.hovered(), None);
        assert_eq!(session.picker(CatalogDomain::Tile).active(), Some("Vitrified Tile"));
        assert_eq!(session.color().as_str(), "#ff6347");
        assert!(session.revision() > revision);
    }
}
