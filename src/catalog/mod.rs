//! Read-only catalog of palette swatches and image-backed items, grouped by
//! category for each customization domain.

use std::collections::HashSet;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../assets/catalog.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogDomain {
    WallTexture,
    Tile,
    Ceiling,
}

impl CatalogDomain {
    pub const ALL: [CatalogDomain; 3] = [Self::WallTexture, Self::Tile, Self::Ceiling];

    pub fn label(self) -> &'static str {
        match self {
            Self::WallTexture => "Room",
            Self::Tile => "Tiles",
            Self::Ceiling => "False Ceiling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Swatch {
    pub code: crate::color::HexColor,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    /// Image resource locator; also the value stored in override records.
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CatalogCategory {
    pub category: String,
    #[serde(alias = "textures", alias = "tiles", default)]
    pub items: Vec<CatalogEntry>,
}

impl CatalogCategory {
    pub fn contains_image(&self, image: &str) -> bool {
        self.items.iter().any(|item| item.image == image)
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub palette: Vec<Swatch>,
    pub textures: Vec<CatalogCategory>,
    pub tiles: Vec<CatalogCategory>,
    pub ceilings: Vec<CatalogCategory>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn categories(&self, domain: CatalogDomain) -> &[CatalogCategory] {
        match domain {
            CatalogDomain::WallTexture => &self.textures,
            CatalogDomain::Tile => &self.tiles,
            CatalogDomain::Ceiling => &self.ceilings,
        }
    }

    pub fn category(&self, domain: CatalogDomain, name: &str) -> Option<&CatalogCategory> {
        self.categories(domain)
            .iter()
            .find(|category| category.category == name)
    }

    /// Items of the named category, or an empty slice when it does not exist.
    pub fn items(&self, domain: CatalogDomain, name: &str) -> &[CatalogEntry] {
        self.category(domain, name)
            .map(|category| category.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_category(&self, domain: CatalogDomain) -> Option<&str> {
        self.categories(domain)
            .first()
            .map(|category| category.category.as_str())
    }

    /// Preferred category if present in the domain, else the first one.
    pub fn initial_category(&self, domain: CatalogDomain, preferred: Option<&str>) -> Option<String> {
        preferred
            .filter(|name| self.category(domain, name).is_some())
            .or_else(|| self.first_category(domain))
            .map(str::to_string)
    }

    /// Non-fatal problems worth logging: duplicate category names and blank image locators.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for domain in CatalogDomain::ALL {
            let mut seen = HashSet::new();
            for category in self.categories(domain) {
                if !seen.insert(category.category.as_str()) {
                    warnings.push(format!(
                        "{}: duplicate category '{}'",
                        domain.label(),
                        category.category
                    ));
                }
                for item in &category.items {
                    if item.image.trim().is_empty() {
                        warnings.push(format!(
                            "{} / {}: item '{}' has no image",
                            domain.label(),
                            category.category,
                            item.name
                        ));
                    }
                }
            }
        }
        warnings
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match <Id as serde::Deserialize>::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
