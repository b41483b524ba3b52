use crate::catalog::{Catalog, CatalogDomain};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PickError {
    #[error("no category selected")]
    NoActiveCategory,
    #[error("'{image}' is not listed in category '{category}'")]
    NotInCategory { category: String, image: String },
}

/// Active category plus the item the user has clicked but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPicker {
    domain: CatalogDomain,
    active: Option<String>,
    tentative: Option<String>,
}

impl CategoryPicker {
    pub fn new(domain: CatalogDomain, active: Option<String>) -> Self {
        Self {
            domain,
            active,
            tentative: None,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn tentative(&self) -> Option<&str> {
        self.tentative.as_deref()
    }

    /// Always clears the tentative item, even when re-selecting the active category.
    pub fn select_category(&mut self, category: impl Into<String>) {
        self.active = Some(category.into());
        self.tentative = None;
    }

    fn lists(&self, catalog: &Catalog, image: &str) -> bool {
        self.active
            .as_deref()
            .and_then(|active| catalog.category(self.domain, active))
            .is_some_and(|category| category.contains_image(image))
    }

    pub fn choose(&mut self, catalog: &Catalog, image: &str) -> Result<(), PickError> {
        let active = self.active.as_deref().ok_or(PickError::NoActiveCategory)?;
        if !self.lists(catalog, image) {
            return Err(PickError::NotInCategory {
                category: active.to_string(),
                image: image.to_string(),
            });
        }
        self.tentative = Some(image.to_string());
        Ok(())
    }

    /// Takes `image` as the tentative item if the active category lists it,
    /// otherwise clears the tentative item.
    pub fn restore_if_present(&mut self, catalog: &Catalog, image: Option<&str>) {
        self.tentative = image
            .filter(|image| self.lists(catalog, image))
            .map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryPicker, PickError};
    use crate::catalog::{Catalog, CatalogDomain};

    const MARBLE: &str = "assets/textures/tiles/carrara_marble.png";
    const OAK: &str = "assets/textures/tiles/oak_plank.png";

    fn tile_picker() -> (Catalog, CategoryPicker) {
        let catalog = Catalog::builtin().unwrap();
        let picker = CategoryPicker::new(CatalogDomain::Tile, Some("Vitrified Tile".to_string()));
        (catalog, picker)
    }

    #[test]
    fn switching_category_clears_tentative_item() {
        let (catalog, mut picker) = tile_picker();
        picker.choose(&catalog, MARBLE).unwrap();
        assert_eq!(picker.tentative(), Some(MARBLE));

        picker.select_category("Wooden Tile");
        assert_eq!(picker.active(), Some("Wooden Tile"));
        assert_eq!(picker.tentative(), None);

        picker.choose(&catalog, OAK).unwrap();
        picker.select_category("Wooden Tile");
        assert_eq!(picker.tentative(), None);
    }

    #[test]
    fn choosing_outside_active_category_is_rejected() {
        let (catalog, mut picker) = tile_picker();
        picker.choose(&catalog, MARBLE).unwrap();
        let err = picker.choose(&catalog, OAK).unwrap_err();
        assert!(matches!(err, PickError::NotInCategory { .. }));
        assert_eq!(picker.tentative(), Some(MARBLE));

        let mut empty = CategoryPicker::new(CatalogDomain::Ceiling, None);
        assert_eq!(empty.choose(&catalog, MARBLE), Err(PickError::NoActiveCategory));
    }

    #[test]
    fn restore_only_keeps_items_from_active_category() {
        let (catalog, mut picker) = tile_picker();
        picker.restore_if_present(&catalog, Some(MARBLE));
        assert_eq!(picker.tentative(), Some(MARBLE));
        picker.restore_if_present(&catalog, Some(OAK));
        assert_eq!(picker.tentative(), None);
        picker.choose(&catalog, MARBLE).unwrap();
        picker.restore_if_present(&catalog, None);
        assert_eq!(picker.tentative(), None);
    }
}
