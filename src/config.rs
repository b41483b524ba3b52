use crate::color::HexColor;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "customizer.json";
pub const MODEL_ENV_VAR: &str = "HOUSE_CUSTOMIZER_MODEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model resource locator (path or http(s) URL).
    pub model: String,
    /// Catalog JSON; the built-in catalog is used when unset.
    pub catalog: Option<PathBuf>,
    /// Download cache for remote resources; remote fetches are not cached when unset.
    pub cache_dir: Option<PathBuf>,
    pub window: WindowConfig,
    pub viewer: ViewerConfig,
    pub defaults: CustomizerDefaults,
    /// Directory relative locators resolve against. Set from the config file location.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub clear_color: [f32; 3],
    pub ambient_intensity: f32,
    pub light_position: [f32; 3],
    pub hover_emissive: HexColor,
    pub hover_intensity: f32,
    pub frame_margin: f32,
    pub damping: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CustomizerDefaults {
    pub color: HexColor,
    /// Scale loaded into the editor when a part without a stored scale is selected.
    pub selection_tile_scale: f32,
    /// Scale shown before any part has been selected.
    pub initial_tile_scale: f32,
    pub wall_category: Option<String>,
    pub tile_category: Option<String>,
    pub ceiling_category: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: "assets/models/house.glb".to_string(),
            catalog: None,
            cache_dir: None,
            window: WindowConfig::default(),
            viewer: ViewerConfig::default(),
            defaults: CustomizerDefaults::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "House Customizer".to_string(),
            width: 1440,
            height: 900,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.93, 0.93, 0.93],
            ambient_intensity: 0.8,
            light_position: [10.0, 14.0, 10.0],
            hover_emissive: HexColor::from_rgb8([0xaa, 0xaa, 0xaa]),
            hover_intensity: 0.5,
            frame_margin: 3.0,
            damping: 0.9,
        }
    }
}

impl Default for CustomizerDefaults {
    fn default() -> Self {
        Self {
            color: HexColor::from_rgb8([0xff, 0x63, 0x47]),
            selection_tile_scale: 5.0,
            initial_tile_scale: 1.0,
            wall_category: Some("Master Bedroom".to_string()),
            tile_category: Some("Vitrified Tile".to_string()),
            ceiling_category: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Explicit path argument, else `customizer.json` if present, else defaults.
    /// The model environment variable overrides whatever was loaded.
    pub fn resolve(arg: Option<&str>, model_override: Option<String>) -> Result<Self, ConfigError> {
        let mut config = match arg {
            Some(path) => Self::load(Path::new(path))?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    log::info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };
        if let Some(model) = model_override.filter(|value| !value.trim().is_empty()) {
            log::info!("Model overridden from {}: {}", MODEL_ENV_VAR, model);
            config.model = model;
        }
        Ok(config)
    }

    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                self.base_dir.join(path)
            }
        })
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                self.base_dir.join(path)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use std::path::PathBuf;

    #[test]
    fn empty_json_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.defaults.color.as_str(), "#ff6347");
        assert_eq!(config.viewer.hover_emissive.as_str(), "#aaaaaa");
        assert_eq!(config.defaults.selection_tile_scale, 5.0);
        assert_eq!(config.defaults.initial_tile_scale, 1.0);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_json(
            r##"{ "model": "https://example.com/house.glb",
                 "viewer": { "hover_intensity": 0.25 },
                 "defaults": { "color": "#00FF00" } }"##,
        )
        .unwrap();
        assert_eq!(config.model, "https://example.com/house.glb");
        assert_eq!(config.viewer.hover_intensity, 0.25);
        assert_eq!(config.viewer.frame_margin, 3.0);
        assert_eq!(config.defaults.color.as_str(), "#00ff00");
        assert_eq!(
            config.defaults.tile_category.as_deref(),
            Some("Vitrified Tile")
        );
    }

    #[test]
    fn invalid_colour_is_a_parse_error() {
        assert!(AppConfig::from_json(r#"{ "defaults": { "color": "tomato" } }"#).is_err());
    }

    #[test]
    fn load_sets_base_dir_and_resolves_relative_paths() {
        let mut dir = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("house_customizer_config_{}_{}", std::process::id(), nonce));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("customizer.json");
        std::fs::write(&path, r#"{ "catalog": "catalog.json", "cache_dir": "cache" }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.base_dir, dir);
        assert_eq!(config.catalog_path(), Some(dir.join("catalog.json")));
        assert_eq!(config.cache_path(), Some(dir.join("cache")));

        let resolved =
            AppConfig::resolve(path.to_str(), Some("override.glb".to_string())).unwrap();
        assert_eq!(resolved.model, "override.glb");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let missing = PathBuf::from("/definitely/not/here/customizer.json");
        assert!(AppConfig::resolve(missing.to_str(), None).is_err());
    }
}
