use crate::color::LinearRgb;

/// Roughness/metalness given to materials promoted to the standard lit model.
pub const COERCED_ROUGHNESS: f32 = 0.5;
pub const COERCED_METALNESS: f32 = 0.5;

/// Slot in the texture library. Resolves to pixels once the load completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// How the renderer samples outside the 0..1 UV range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    pub source: String,
    pub handle: TextureHandle,
    pub wrap: WrapMode,
    pub repeat: [f32; 2],
}

/// Lit metallic/roughness material; the only kind the renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub name: String,
    pub color: LinearRgb,
    pub roughness: f32,
    pub metalness: f32,
    pub map: Option<TextureBinding>,
    pub emissive: LinearRgb,
    pub emissive_intensity: f32,
}

impl StandardMaterial {
    pub fn new(name: impl Into<String>, color: LinearRgb) -> Self {
        Self {
            name: name.into(),
            color,
            roughness: COERCED_ROUGHNESS,
            metalness: COERCED_METALNESS,
            map: None,
            emissive: LinearRgb::BLACK,
            emissive_intensity: 0.0,
        }
    }
}

/// Unlit material (glTF `KHR_materials_unlit`).
#[derive(Debug, Clone, PartialEq)]
pub struct BasicMaterial {
    pub name: String,
    pub color: LinearRgb,
    pub map: Option<TextureBinding>,
}

/// Material as it came out of the model file.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    Unlit(BasicMaterial),
}

impl Material {
    pub fn name(&self) -> &str {
        match self {
            Self::Standard(material) => &material.name,
            Self::Unlit(material) => &material.name,
        }
    }

    /// Standard materials pass through untouched. Anything else is replaced by a
    /// standard material that keeps only the colour (and name).
    pub fn to_standard(&self) -> StandardMaterial {
        match self {
            Self::Standard(material) => material.clone(),
            Self::Unlit(material) => StandardMaterial::new(material.name.clone(), material.color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> TextureBinding {
        TextureBinding {
            source: "gltf-image:0".to_string(),
            handle: TextureHandle(3),
            wrap: WrapMode::Repeat,
            repeat: [1.0, 1.0],
        }
    }

    #[test]
    fn standard_material_passes_through_unchanged() {
        let mut standard = StandardMaterial::new("Roof", LinearRgb([0.2, 0.1, 0.0]));
        standard.roughness = 0.9;
        standard.metalness = 0.0;
        standard.map = Some(binding());
        let material = Material::Standard(standard.clone());
        assert_eq!(material.to_standard(), standard);
    }

    #[test]
    fn unlit_material_is_coerced_keeping_colour_only() {
        let material = Material::Unlit(BasicMaterial {
            name: "Glass".to_string(),
            color: LinearRgb([0.5, 0.5, 0.5]),
            map: Some(binding()),
        });
        let coerced = material.to_standard();
        assert_eq!(coerced.name, "Glass");
        assert_eq!(coerced.color, LinearRgb([0.5, 0.5, 0.5]));
        assert_eq!(coerced.roughness, COERCED_ROUGHNESS);
        assert_eq!(coerced.metalness, COERCED_METALNESS);
        assert!(coerced.map.is_none());
        assert_eq!(coerced.emissive_intensity, 0.0);
    }
}
